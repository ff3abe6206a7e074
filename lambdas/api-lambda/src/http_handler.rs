use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use manhwa_shared::authz::extract_session;
use manhwa_shared::objects::ObjectStore;
use manhwa_shared::store::{ProfileStore, SeriesStore};
use manhwa_shared::{auth, chapters, profiles, series, AppState};
use std::env;
use std::sync::Arc;

/// Main Lambda handler - routes requests to public, auth and admin endpoints
pub(crate) async fn function_handler<S, P, O>(
    event: Request,
    state: Arc<AppState<S, P, O>>,
) -> Result<Response<Body>, Error>
where
    S: SeriesStore,
    P: ProfileStore,
    O: ObjectStore,
{
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == "OPTIONS" {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header(
                "Access-Control-Allow-Methods",
                "GET,POST,PUT,PATCH,DELETE,OPTIONS",
            )
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,Authorization,X-User-Id",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    // Auth endpoints (no session; Cognito is configured from the environment
    // and constructed here, not carried in shared state)
    if matches!(path, "/login" | "/signup" | "/refresh" | "/logout") {
        if method != &Method::POST {
            return method_not_allowed();
        }
        let client_id = env::var("COGNITO_CLIENT_ID").expect("COGNITO_CLIENT_ID must be set");
        let client_secret =
            env::var("COGNITO_CLIENT_SECRET").expect("COGNITO_CLIENT_SECRET must be set");
        let config = aws_config::load_from_env().await;
        let cognito_client = CognitoClient::new(&config);

        return match path {
            "/login" => auth::login(&cognito_client, &client_id, &client_secret, body).await,
            "/signup" => {
                auth::signup(
                    &cognito_client,
                    &state.profiles,
                    &client_id,
                    &client_secret,
                    body,
                )
                .await
            }
            "/refresh" => {
                auth::refresh_token(&cognito_client, &client_id, &client_secret, body).await
            }
            _ => auth::logout(&cognito_client, body).await,
        };
    }

    // Everything below carries an optional session; each handler runs its
    // own authorization gate.
    let session = extract_session(&event);

    // Profile routes
    if path.starts_with("/profiles") {
        return match (method, path) {
            (&Method::GET, "/profiles/me") => {
                profiles::get_profile(&state.profiles, session.as_ref()).await
            }
            (&Method::PATCH, "/profiles/me") => {
                profiles::update_profile(&state.profiles, session.as_ref(), body).await
            }
            _ => not_found(),
        };
    }

    // Series routes
    if path.starts_with("/series") {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        return match (method, parts.as_slice()) {
            // --- SERIES ---
            // GET /series - public catalog listing
            (&Method::GET, ["series"]) => {
                let order_by = event
                    .query_string_parameters_ref()
                    .and_then(|params| params.first("order_by"))
                    .map(|s| s.to_string());
                series::list_series(&state.series, order_by.as_deref()).await
            }
            // POST /series - create series (admin)
            (&Method::POST, ["series"]) => {
                series::create_series(&state.series, &state.profiles, session.as_ref(), body).await
            }
            // GET /series/{id} - public series detail
            (&Method::GET, ["series", series_id]) => {
                series::get_series(&state.series, series_id).await
            }
            // PATCH /series/{id} - partial update (admin)
            (&Method::PATCH, ["series", series_id]) => {
                series::update_series(
                    &state.series,
                    &state.profiles,
                    session.as_ref(),
                    series_id,
                    body,
                )
                .await
            }
            // DELETE /series/{id} - delete series + sweep assets (admin)
            (&Method::DELETE, ["series", series_id]) => {
                series::delete_series(
                    &state.series,
                    &state.profiles,
                    &state.objects,
                    session.as_ref(),
                    series_id,
                )
                .await
            }
            // POST /series/{id}/cover - upload cover image (admin)
            (&Method::POST, ["series", series_id, "cover"]) => {
                series::upload_cover(
                    &state.series,
                    &state.profiles,
                    &state.objects,
                    session.as_ref(),
                    series_id,
                    body,
                )
                .await
            }

            // --- CHAPTERS ---
            // GET /series/{id}/chapters/{number} - public reader, 1-based
            (&Method::GET, ["series", series_id, "chapters", number]) => {
                match number.parse::<u32>() {
                    Ok(number) => chapters::get_chapter(&state.series, series_id, number).await,
                    Err(_) => not_found(),
                }
            }
            // POST /series/{id}/chapters - upload + append a chapter (admin)
            (&Method::POST, ["series", series_id, "chapters"]) => {
                chapters::create_chapter(
                    &state.series,
                    &state.profiles,
                    &state.objects,
                    session.as_ref(),
                    series_id,
                    body,
                )
                .await
            }
            // DELETE /series/{id}/chapters/{index} - delete + renumber (admin)
            (&Method::DELETE, ["series", series_id, "chapters", index]) => {
                match index.parse::<usize>() {
                    Ok(index) => {
                        chapters::delete_chapter(
                            &state.series,
                            &state.profiles,
                            &state.objects,
                            session.as_ref(),
                            series_id,
                            index,
                        )
                        .await
                    }
                    Err(_) => not_found(),
                }
            }
            _ => not_found(),
        };
    }

    // No matching route
    tracing::warn!("No route matched - Method: {} Path: {}", method, path);
    not_found()
}

fn method_not_allowed() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(
            serde_json::json!({"error": "Method not allowed"})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};
    use lambda_http::http;
    use manhwa_shared::memory::{MemoryObjectStore, MemoryStore};
    use manhwa_shared::types::{Profile, Role, Series};

    type TestState = AppState<MemoryStore, MemoryStore, MemoryObjectStore>;

    fn test_state() -> Arc<TestState> {
        // Series and profiles could share one MemoryStore, but separate
        // instances keep the two seams independent, like production.
        AppState::new(
            MemoryStore::new(),
            MemoryStore::new().with_profile(Profile {
                id: "admin1".into(),
                username: "admin1".into(),
                email: "admin@test.dev".into(),
                role: Role::Admin,
                created_at: "2026-01-01T00:00:00Z".into(),
            }),
            MemoryObjectStore::new(),
        )
    }

    fn request(method: &str, path: &str, user: Option<&str>, body: &str) -> Request {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user);
        }
        builder
            .body(Body::Text(body.to_string()))
            .expect("failed to build request")
    }

    fn png_payload() -> String {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.resize(64, 0);
        general_purpose::STANDARD.encode(&png)
    }

    #[tokio::test]
    async fn options_preflight_is_open() {
        let state = test_state();
        let response = function_handler(request("OPTIONS", "/series", None, ""), state)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let state = test_state();
        let response = function_handler(request("GET", "/nope", None, ""), state)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn catalog_is_public_and_mutation_is_gated() {
        let state = test_state();

        let response = function_handler(
            request("GET", "/series", None, ""),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Anonymous create is denied before any state is touched.
        let response = function_handler(
            request("POST", "/series", None, r#"{"title": "A"}"#),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_can_publish_and_read_a_chapter() {
        let state = test_state();

        // Create a series.
        let response = function_handler(
            request("POST", "/series", Some("admin1"), r#"{"title": "Tower"}"#),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let series: Series = serde_json::from_slice(&response.body().to_vec()).unwrap();

        // Publish a two-page chapter, reordered during composition.
        let chapter_body = serde_json::json!({
            "pages": [
                {"file_name": "b.png", "content_type": "image/png", "file_data": png_payload()},
                {"file_name": "a.png", "content_type": "image/png", "file_data": png_payload()},
            ],
            "moves": [{"from": 1, "to": 0}],
        });
        let response = function_handler(
            request(
                "POST",
                &format!("/series/{}/chapters", series.id),
                Some("admin1"),
                &chapter_body.to_string(),
            ),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Read it back through the public reader route.
        let response = function_handler(
            request(
                "GET",
                &format!("/series/{}/chapters/1", series.id),
                None,
                "",
            ),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view: serde_json::Value = serde_json::from_slice(&response.body().to_vec()).unwrap();
        assert_eq!(view["chapter"]["number"], 1);
        assert_eq!(view["chapter"]["page_count"], 2);
        assert_eq!(view["total_chapters"], 1);
        // The staged move put a.png first.
        let first_page = view["chapter"]["pages"][0].as_str().unwrap();
        assert!(first_page.contains("_0_"));

        // Chapter 2 does not exist yet.
        let response = function_handler(
            request(
                "GET",
                &format!("/series/{}/chapters/2", series.id),
                None,
                "",
            ),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_chapter_renumbers_the_rest() {
        let state = test_state();

        let response = function_handler(
            request("POST", "/series", Some("admin1"), r#"{"title": "Arc"}"#),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        let series: Series = serde_json::from_slice(&response.body().to_vec()).unwrap();

        for _ in 0..2 {
            let chapter_body = serde_json::json!({
                "pages": [
                    {"file_name": "p.png", "content_type": "image/png", "file_data": png_payload()},
                ],
            });
            let response = function_handler(
                request(
                    "POST",
                    &format!("/series/{}/chapters", series.id),
                    Some("admin1"),
                    &chapter_body.to_string(),
                ),
                Arc::clone(&state),
            )
            .await
            .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = function_handler(
            request(
                "DELETE",
                &format!("/series/{}/chapters/0", series.id),
                Some("admin1"),
                "",
            ),
            Arc::clone(&state),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: Series = serde_json::from_slice(&response.body().to_vec()).unwrap();
        assert_eq!(updated.chapters.len(), 1);
        assert_eq!(updated.chapters[0].number, 1);
    }
}
