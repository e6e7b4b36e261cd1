use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use resrank_core::EntityId;
use resrank_engine::{Error, Recommender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Deserialize)]
struct RecommendRequest {
    #[serde(default)]
    query: String,
    top_k: Option<usize>,
}

#[derive(Deserialize)]
struct NameSearch {
    #[serde(default)]
    q: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_limit() -> usize {
    20
}

#[derive(Serialize)]
struct EntityProfile<'a> {
    entity_id: &'a EntityId,
    name: &'a str,
    primary_keywords: &'a [String],
    secondary_keywords: &'a [String],
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    entities: usize,
    rejected: usize,
    dim: usize,
    backend: String,
    embedding_model: String,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(recommender: Arc<Recommender>, host: &str, port: u16) -> std::io::Result<()> {
        info!(host, port, "Starting REST API");
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(recommender.clone()))
                .configure(Self::configure)
        })
        .bind((host, port))?
        .run()
        .await
    }

    /// Register every route; the recommender must be set as app data.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/recommend", web::post().to(recommend))
            .route("/entities/search", web::get().to(search_entities))
            .route("/entities/{id}", web::get().to(get_entity))
            .route("/health", web::get().to(health))
            .route("/reload", web::post().to(reload));
    }
}

fn error_response(e: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        Error::Embedding(_) => HttpResponse::BadGateway().json(body),
        Error::Timeout { .. } => HttpResponse::GatewayTimeout().json(body),
        Error::Core(resrank_core::Error::EmptyIndex) => {
            HttpResponse::ServiceUnavailable().json(body)
        }
        _ => HttpResponse::InternalServerError().json(body),
    }
}

async fn recommend(
    recommender: web::Data<Arc<Recommender>>,
    req: web::Json<RecommendRequest>,
) -> ActixResult<HttpResponse> {
    let req = req.into_inner();
    match recommender.recommend(&req.query, req.top_k).await {
        Ok(results) => Ok(HttpResponse::Ok().json(results)),
        Err(e) => {
            warn!(error = %e, "Recommendation request failed");
            Ok(error_response(&e))
        }
    }
}

async fn get_entity(
    recommender: web::Data<Arc<Recommender>>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let id = EntityId::new(path.into_inner());
    let catalog = recommender.store().snapshot();

    match catalog.entity(&id) {
        Some(entity) => Ok(HttpResponse::Ok().json(EntityProfile {
            entity_id: &entity.id,
            name: &entity.display_name,
            primary_keywords: &entity.keywords.primary,
            secondary_keywords: &entity.keywords.secondary,
        })),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Entity not found"
        }))),
    }
}

async fn search_entities(
    recommender: web::Data<Arc<Recommender>>,
    params: web::Query<NameSearch>,
) -> ActixResult<HttpResponse> {
    let catalog = recommender.store().snapshot();
    let profiles: Vec<EntityProfile<'_>> = catalog
        .search_by_name(&params.q, params.limit)
        .into_iter()
        .map(|entity| EntityProfile {
            entity_id: &entity.id,
            name: &entity.display_name,
            primary_keywords: &entity.keywords.primary,
            secondary_keywords: &entity.keywords.secondary,
        })
        .collect();
    Ok(HttpResponse::Ok().json(profiles))
}

async fn health(recommender: web::Data<Arc<Recommender>>) -> ActixResult<HttpResponse> {
    let catalog = recommender.store().snapshot();
    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        entities: catalog.len(),
        rejected: catalog.rejected().len(),
        dim: catalog.dim(),
        backend: catalog.backend_kind().to_string(),
        embedding_model: recommender.encoder().model_name().to_string(),
    }))
}

async fn reload(recommender: web::Data<Arc<Recommender>>) -> ActixResult<HttpResponse> {
    let store = recommender.store().clone();
    let outcome = web::block(move || store.reload()).await?;

    match outcome {
        Ok(catalog) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "result": true,
            "entities": catalog.len(),
            "rejected": catalog.rejected().len(),
        }))),
        Err(e) => {
            error!(error = %e, "Catalog reload failed, keeping previous catalog");
            Ok(error_response(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use resrank_core::{EntityRecord, IndexOptions, KeywordSets, Vector};
    use resrank_engine::{
        EntityStore, HashingEmbedder, InMemoryEntitySource, RecommenderConfig,
    };
    use resrank_scoring::Recommendation;

    const DIM: usize = 128;

    fn recommender() -> Arc<Recommender> {
        let embedder = HashingEmbedder::new(DIM).unwrap();
        let profile = |id: &str, name: &str, text: &str, keywords: &[&str]| {
            EntityRecord::new(
                id,
                name,
                Vector::new(embedder.embed_text(text)),
                KeywordSets::new(keywords.iter().map(|s| s.to_string()).collect(), vec![]),
            )
        };
        let records = vec![
            profile("r1", "Dr. Kim", "solid state battery electrolyte", &["battery", "electrolyte"]),
            profile("r2", "Dr. Lee", "medieval poetry and literature", &["poetry"]),
        ];
        let store = EntityStore::init(
            Arc::new(InMemoryEntitySource::new(records)),
            IndexOptions::exact(),
        )
        .unwrap();
        let config = RecommenderConfig {
            similarity_threshold: 0.0,
            ..Default::default()
        };
        Arc::new(Recommender::new(Arc::new(store), Some(Arc::new(embedder)), config).unwrap())
    }

    macro_rules! service {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(recommender()))
                    .configure(RestApi::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_recommend_ranks_matching_entity_first() {
        let app = service!();
        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(serde_json::json!({"query": "battery electrolyte", "top_k": 2}))
            .to_request();
        let results: Vec<Recommendation> = test::call_and_read_body_json(&app, req).await;

        assert!(!results.is_empty());
        assert_eq!(results[0].entity_id.as_str(), "r1");
        assert!(results[0].keyword_bonus > 0.0);
        assert!(!results[0].rationale.is_empty());
    }

    #[actix_web::test]
    async fn test_recommend_blank_query_returns_empty_array() {
        let app = service!();
        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(serde_json::json!({"query": "  "}))
            .to_request();
        let results: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert!(results.is_empty());
    }

    #[actix_web::test]
    async fn test_entity_lookup() {
        let app = service!();
        let req = test::TestRequest::get().uri("/entities/r2").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "Dr. Lee");
        assert_eq!(body["primary_keywords"][0], "poetry");

        let req = test::TestRequest::get().uri("/entities/nobody").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_name_search() {
        let app = service!();
        let req = test::TestRequest::get().uri("/entities/search?q=lee").to_request();
        let body: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["entity_id"], "r2");

        let req = test::TestRequest::get().uri("/entities/search?q=dr&limit=1").to_request();
        let body: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["entity_id"], "r1");

        let req = test::TestRequest::get().uri("/entities/search").to_request();
        let body: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert!(body.is_empty());
    }

    #[actix_web::test]
    async fn test_health_and_reload() {
        let app = service!();
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["entities"], 2);
        assert_eq!(body["dim"], DIM);
        assert_eq!(body["backend"], "exact");

        let req = test::TestRequest::post().uri("/reload").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"], true);
        assert_eq!(body["entities"], 2);
    }
}
