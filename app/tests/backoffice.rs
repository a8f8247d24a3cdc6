//! ABOUTME: End-to-end tests of the host backoffice through the actix service
//! ABOUTME: Covers sign-in, the users and stuffs resources, export and the dashboard

use actix_web::{dev::ServiceResponse, http::StatusCode, test};
use app::models::{NewStuff, Status, StuffRepository};
use bo_config::{BackofficeSettings, SecurityConfig};
use bo_db::{QuerySet, User, UserRepository};
use bo_obs::Metrics;
use bo_web::{create_app, flash::FLASH_COOKIE, AppState, Backoffice};
use rust_decimal::Decimal;
use std::sync::Arc;
use test_support::{seed_user, session_cookie, TestDb, TEST_JWT_SECRET};

struct Setup {
    _test_db: TestDb,
    state: AppState,
    backoffice: Backoffice,
    user: User,
}

impl Setup {
    async fn new() -> Self {
        let test_db = TestDb::new().await.unwrap();
        app::migrate(&test_db.db).await.unwrap();
        let user = seed_user(&test_db.db, "staff", "p0t4t0-staff", true)
            .await
            .unwrap();

        let backoffice = app::backoffice::build(BackofficeSettings::default()).unwrap();
        let security = SecurityConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            secure_cookies: false,
        };
        let state = backoffice
            .app_state(test_db.db.clone(), security, Arc::new(Metrics::new()), 262144)
            .unwrap();

        Self {
            _test_db: test_db,
            state,
            backoffice,
            user,
        }
    }

    fn url(&self, name: &str, pk: Option<i64>) -> String {
        let pk = pk.map(|pk| pk.to_string());
        let kwargs: Vec<(&str, &str)> = pk.iter().map(|pk| ("pk", pk.as_str())).collect();
        self.state
            .urls
            .reverse(&format!("backoffice:{}", name), &kwargs)
            .unwrap()
    }

    async fn user_count(&self) -> i64 {
        QuerySet::<User>::all().count(self.state.db.pool()).await.unwrap()
    }
}

fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn test_get_index() {
    let setup = Setup::new().await;
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;

    let req = test::TestRequest::get()
        .uri(&setup.url("index", None))
        .cookie(session_cookie(&setup.user, TEST_JWT_SECRET).unwrap())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
    assert!(body.contains("Active users"));
    assert!(body.contains("100.0 %"));
}

#[actix_web::test]
async fn test_sign_in_and_out() {
    let setup = Setup::new().await;
    seed_user(&setup.state.db, "dummy", "p0t4t0", false).await.unwrap();
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;

    let req = test::TestRequest::get()
        .uri(&setup.url("sign-in", None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri(&setup.url("sign-in", None))
        .set_form([("username", "dummy"), ("password", "p0t4t0")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/backoffice/");

    let req = test::TestRequest::get()
        .uri(&setup.url("sign-out", None))
        .cookie(session_cookie(&setup.user, TEST_JWT_SECRET).unwrap())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FOUND);
}

#[actix_web::test]
async fn test_users_pages() {
    let setup = Setup::new().await;
    for i in 0..20 {
        seed_user(&setup.state.db, &format!("user{:02}", i), "pw", false)
            .await
            .unwrap();
    }
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;
    let cookie = session_cookie(&setup.user, TEST_JWT_SECRET).unwrap();

    for uri in [
        setup.url("user-list", None),
        format!("{}?page=2", setup.url("user-list", None)),
        format!("{}?search=user1", setup.url("user-list", None)),
        format!("{}?date_joined_after=2000-01-01", setup.url("user-list", None)),
        setup.url("user-create", None),
        setup.url("user-detail", Some(setup.user.id)),
        setup.url("user-edit", Some(setup.user.id)),
    ] {
        let req = test::TestRequest::get()
            .uri(&uri)
            .cookie(cookie.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK, "{}", uri);
    }
}

#[actix_web::test]
async fn test_post_user_create() {
    let setup = Setup::new().await;
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;

    let req = test::TestRequest::post()
        .uri(&setup.url("user-create", None))
        .cookie(session_cookie(&setup.user, TEST_JWT_SECRET).unwrap())
        .set_form([("username", "dummy"), ("password", "p0t4t0")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(resp.response().cookies().any(|c| c.name() == FLASH_COOKIE));
    assert_eq!(setup.user_count().await, 2);

    let created = UserRepository::new(setup.state.db.pool())
        .find_by_username("dummy")
        .await
        .unwrap()
        .unwrap();
    assert!(bo_web::auth::PasswordAuth::verify_password("p0t4t0", &created.password_hash));
}

#[actix_web::test]
async fn test_post_user_create_requires_password() {
    let setup = Setup::new().await;
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;

    let req = test::TestRequest::post()
        .uri(&setup.url("user-create", None))
        .cookie(session_cookie(&setup.user, TEST_JWT_SECRET).unwrap())
        .set_form([("username", "dummy")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
    assert!(body.contains("This field is required."));
    assert_eq!(setup.user_count().await, 1);
}

#[actix_web::test]
async fn test_post_user_edit() {
    let setup = Setup::new().await;
    let other = seed_user(&setup.state.db, "other", "pw", false).await.unwrap();
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;

    let req = test::TestRequest::post()
        .uri(&setup.url("user-edit", Some(other.id)))
        .cookie(session_cookie(&setup.user, TEST_JWT_SECRET).unwrap())
        .set_form([("username", "dummy")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), setup.url("user-detail", Some(other.id)));
    let updated = UserRepository::new(setup.state.db.pool())
        .find_by_id(other.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.username, "dummy");
}

#[actix_web::test]
async fn test_get_user_export() {
    let setup = Setup::new().await;
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;

    let req = test::TestRequest::get()
        .uri(&setup.url("user-export", None))
        .cookie(session_cookie(&setup.user, TEST_JWT_SECRET).unwrap())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(
        lines[0],
        "id,email,first_name,last_name,is_superuser,is_staff,is_active,date_joined"
    );
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with(&format!("{},staff@example.com,,,true,true,true,", setup.user.id)));
}

#[actix_web::test]
async fn test_stuffs_pages() {
    let setup = Setup::new().await;
    let stuff = StuffRepository::new(setup.state.db.pool())
        .create(NewStuff {
            status: Status::Active,
            price: Decimal::new(1999, 2),
            ..NewStuff::new(setup.user.id)
        })
        .await
        .unwrap();
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;
    let cookie = session_cookie(&setup.user, TEST_JWT_SECRET).unwrap();

    let req = test::TestRequest::get()
        .uri(&setup.url("stuff-list", None))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
    assert!(body.contains("success"));
    assert!(body.contains(&setup.url("user-detail", Some(setup.user.id))));

    let req = test::TestRequest::get()
        .uri(&setup.url("stuff-detail", Some(stuff.id)))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8_lossy(&test::read_body(resp).await).to_string();
    assert!(body.contains("19.99"));
}

#[actix_web::test]
async fn test_owner_with_stuffs_cannot_be_deleted() {
    let setup = Setup::new().await;
    let owner = seed_user(&setup.state.db, "owner", "pw", false).await.unwrap();
    let stuffs = StuffRepository::new(setup.state.db.pool());
    let stuff = stuffs.create(NewStuff::new(owner.id)).await.unwrap();
    let app = test::init_service(create_app(setup.state.clone(), setup.backoffice.clone())).await;
    let cookie = session_cookie(&setup.user, TEST_JWT_SECRET).unwrap();

    let req = test::TestRequest::post()
        .uri(&setup.url("user-delete", Some(owner.id)))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), setup.url("user-list", None));
    assert_eq!(setup.user_count().await, 2);

    // The queued error shows on the next page
    let flash = resp
        .response()
        .cookies()
        .find(|c| c.name() == FLASH_COOKIE)
        .unwrap()
        .into_owned();
    let req = test::TestRequest::get()
        .uri(&setup.url("user-list", None))
        .cookie(cookie.clone())
        .cookie(flash)
        .to_request();
    let body = String::from_utf8_lossy(&test::read_body(test::call_service(&app, req).await).await)
        .to_string();
    assert!(body.contains("owner can&#x27;t be deleted") || body.contains("owner can't be deleted"));

    let req = test::TestRequest::get()
        .uri(&setup.url("stuff-delete", Some(stuff.id)))
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FOUND);
    assert!(stuffs.find_by_id(stuff.id).await.unwrap().is_none());

    let req = test::TestRequest::post()
        .uri(&setup.url("user-delete", Some(owner.id)))
        .cookie(cookie)
        .to_request();
    test::call_service(&app, req).await;
    assert_eq!(setup.user_count().await, 1);
}
