use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_payload(config: &crate::config::AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "audio": {
            "sample_rate": config.audio.sample_rate,
            "min_new_audio_ms": config.audio.min_new_audio_ms,
            "overlap_ms": config.audio.overlap_ms,
            "long_session_warn_secs": config.audio.long_session_warn_secs
        },
        "summarization": {
            "chunk_size": config.summarization.chunk_size
        },
        "models": {
            "whisper_model": config.models.whisper_model,
            "multilingual_summarizer": config.models.multilingual_summarizer,
            "english_summarizer": config.models.english_summarizer,
            "device": config.models.device
        },
        "performance": {
            "max_concurrent_sessions": config.performance.max_concurrent_sessions,
            "engine_timeout_secs": config.performance.engine_timeout_secs
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_payload(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_payload(&current_config)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[actix_web::test]
    async fn test_get_config() {
        let state = web::Data::new(AppState::new(AppConfig::default()).unwrap());
        let response = get_config(state).await.unwrap();
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_update_config_applies_partial_changes() {
        let state = web::Data::new(AppState::new(AppConfig::default()).unwrap());
        let body = web::Json(serde_json::json!({"audio": {"overlap_ms": 250}}));

        let response = update_config(state.clone(), body).await.unwrap();
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
        assert_eq!(state.get_config().audio.overlap_ms, 250);
    }

    #[actix_web::test]
    async fn test_update_config_rejects_invalid_values() {
        let state = web::Data::new(AppState::new(AppConfig::default()).unwrap());
        let body = web::Json(serde_json::json!({"models": {"whisper_model": "gigantic"}}));

        assert!(update_config(state.clone(), body).await.is_err());
        // Rejected update leaves the configuration untouched
        assert_eq!(state.get_config().models.whisper_model, "medium");
    }
}
