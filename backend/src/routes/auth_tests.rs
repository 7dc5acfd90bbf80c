//! Route tests for cookie-session authentication
//!
//! Requests without a live session must get 401 on protected endpoints,
//! whatever the cookie header looks like.

#[cfg(test)]
mod tests {
    use crate::auth::generate_session_id;
    use crate::routes::create_router;
    use crate::test_support::{
        login_token, memory_state, seeded_state, ADMIN_EMAIL, ADMIN_PASSWORD, USER_EMAIL,
        USER_PASSWORD,
    };
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use kummerkasten_shared::{UserProfile, UserRole};
    use proptest::prelude::*;
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn set_cookie(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .expect("Set-Cookie header")
            .to_str()
            .unwrap()
            .to_string()
    }

    fn login_request(email: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "email": email, "password": password }).to_string(),
            ))
            .unwrap()
    }

    fn me_request(token: &str) -> Request<Body> {
        Request::builder()
            .uri("/api/v1/auth/me")
            .header(header::COOKIE, format!("sessionCookie={}", token))
            .body(Body::empty())
            .unwrap()
    }

    /// Cookie headers that never carry a live session
    fn cookie_header_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just("".to_string()).prop_map(Some),
            "[a-zA-Z0-9]{1,50}".prop_map(|t| Some(format!("sessionCookie={}", t))),
            // Well formed but never issued
            "[A-Za-z0-9_-]{24}".prop_map(|t| Some(format!("sessionCookie={}", t))),
            "[A-Za-z0-9_-]{24}".prop_map(|t| Some(format!("otherCookie={}", t))),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_requests_without_session_return_401(cookie in cookie_header_strategy()) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let app = create_router(memory_state().await);

                let mut builder = Request::builder().uri("/api/v1/auth/me").method("GET");
                if let Some(cookie) = cookie {
                    builder = builder.header(header::COOKIE, cookie);
                }
                let response = send(&app, builder.body(Body::empty()).unwrap()).await;

                prop_assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let (state, _, user) = seeded_state().await;
        let app = create_router(state);

        let response = send(&app, login_request(USER_EMAIL, USER_PASSWORD)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("sessionCookie="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));

        let profile: UserProfile = body_json(response).await;
        assert_eq!(profile.id, user.id);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_returns_401() {
        let (state, _, _) = seeded_state().await;
        let app = create_router(state);

        let response = send(&app, login_request(USER_EMAIL, "not-the-password")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_session_cookie_grants_access() {
        let (state, _, user) = seeded_state().await;
        let token = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let app = create_router(state);

        let response = send(&app, me_request(&token)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let profile: UserProfile = body_json(response).await;
        assert_eq!(profile.email, USER_EMAIL);
        assert_eq!(profile.role, UserRole::User);
        assert_eq!(profile.id, user.id);
    }

    #[tokio::test]
    async fn test_unknown_well_formed_token_returns_401() {
        let (state, _, _) = seeded_state().await;
        let app = create_router(state);

        let response = send(&app, me_request(&generate_session_id().unwrap())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (state, _, _) = seeded_state().await;
        let token = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let app = create_router(state);

        let logout = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/logout")
            .header(header::COOKIE, format!("sessionCookie={}", token))
            .body(Body::empty())
            .unwrap();
        let response = send(&app, logout).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(set_cookie(&response).contains("Max-Age=0"));
        assert_eq!(
            send(&app, me_request(&token)).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_logout_without_session_succeeds() {
        let app = create_router(memory_state().await);
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/logout")
            .body(Body::empty())
            .unwrap();

        assert_eq!(send(&app, request).await.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_password_change_ends_every_session() {
        let (state, _, _) = seeded_state().await;
        let first = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let second = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let app = create_router(state);

        let request = Request::builder()
            .method("PUT")
            .uri("/api/v1/auth/password")
            .header(header::COOKIE, format!("sessionCookie={}", first))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({
                    "current_password": USER_PASSWORD,
                    "new_password": "a-brand-new-password",
                })
                .to_string(),
            ))
            .unwrap();
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        for token in [&first, &second] {
            assert_eq!(
                send(&app, me_request(token)).await.status(),
                StatusCode::UNAUTHORIZED
            );
        }
        assert_eq!(
            send(&app, login_request(USER_EMAIL, "a-brand-new-password"))
                .await
                .status(),
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_user_admin_requires_admin_role() {
        let (state, _, _) = seeded_state().await;
        let user_token = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let admin_token = login_token(&state, ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let app = create_router(state);

        let create = |token: Option<&str>| {
            let mut builder = Request::builder()
                .method("POST")
                .uri("/api/v1/users")
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(token) = token {
                builder = builder.header(header::COOKIE, format!("sessionCookie={}", token));
            }
            builder
                .body(Body::from(
                    serde_json::json!({
                        "email": "new.member@example.com",
                        "firstname": "New",
                        "lastname": "Member",
                        "password": "member-password",
                    })
                    .to_string(),
                ))
                .unwrap()
        };

        assert_eq!(send(&app, create(None)).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            send(&app, create(Some(&user_token))).await.status(),
            StatusCode::FORBIDDEN
        );

        let response = send(&app, create(Some(&admin_token))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let profile: UserProfile = body_json(response).await;
        assert_eq!(profile.role, UserRole::User);

        assert_eq!(
            send(&app, create(Some(&admin_token))).await.status(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_user_profile_visible_to_owner_and_admin() {
        let (state, admin, user) = seeded_state().await;
        let user_token = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let admin_token = login_token(&state, ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let app = create_router(state);

        let get = |id: uuid::Uuid, token: &str| {
            Request::builder()
                .uri(format!("/api/v1/users/{}", id))
                .header(header::COOKIE, format!("sessionCookie={}", token))
                .body(Body::empty())
                .unwrap()
        };

        let response = send(&app, get(user.id, &user_token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let profile: UserProfile = body_json(response).await;
        assert_eq!(profile.email, USER_EMAIL);

        assert_eq!(
            send(&app, get(admin.id, &user_token)).await.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            send(&app, get(user.id, &admin_token)).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            send(&app, get(uuid::Uuid::new_v4(), &admin_token)).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_deleting_user_ends_their_sessions() {
        let (state, _, user) = seeded_state().await;
        let user_token = login_token(&state, USER_EMAIL, USER_PASSWORD).await;
        let admin_token = login_token(&state, ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let app = create_router(state);

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/users/{}", user.id))
                .header(header::COOKIE, format!("sessionCookie={}", admin_token))
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(send(&app, delete()).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            send(&app, me_request(&user_token)).await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(send(&app, delete()).await.status(), StatusCode::NOT_FOUND);
    }
}
