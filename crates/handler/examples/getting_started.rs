use bytes::Bytes;
use http::{Method, Request};
use http_body_util::Full;
use micro_handler::extract::{Form, Json, Path, Query};
use micro_handler::router::{get, post};
use micro_handler::{handler_fn, FieldError, HttpError, Outcome, Router, Validate, ValidationErrors};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    #[serde(default)]
    name: String,
    #[serde(default)]
    zip: String,
}

impl Validate for User {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors
            .check(!self.name.is_empty(), FieldError::new("Name", "required").with_name("name"))
            .check(self.zip.len() == 5, FieldError::new("Zip", "len").with_name("zip").with_param("5"));
        errors.into_result()
    }
}

#[derive(Deserialize, Debug)]
pub struct Page {
    page: u32,
    size: u32,
}

impl Validate for Page {}

async fn create_from_form(Form(user): Form<User>) -> Outcome<Json<User>> {
    Outcome::ok(Json(user)).with_code(201)
}

async fn create_from_json(Json(user): Json<User>) -> Outcome<Json<User>> {
    Outcome::ok(Json(user)).with_code(201)
}

async fn get_user(id: Path<u64>) -> Result<Json<User>, HttpError> {
    match *id {
        0 => Err(HttpError::not_found(format!("user {} not found", *id))),
        id => Ok(Json(User { name: format!("user-{id}"), zip: "00000".into() })),
    }
}

async fn list_users(Query(page): Query<Page>) -> String {
    format!("page {} of size {}\r\n", page.page, page.size)
}

fn request(method: Method, uri: &str, content_type: &str, body: &'static str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let router = Router::builder()
        .route("/form", post(handler_fn(create_from_form)))
        .route("/json", post(handler_fn(create_from_json)))
        .route("/users", get(handler_fn(list_users)))
        .route("/users/{id}", get(handler_fn(get_user)))
        .build();

    let requests = [
        request(Method::POST, "/form", mime::APPLICATION_WWW_FORM_URLENCODED.as_ref(), "name=hello&zip=world"),
        request(Method::POST, "/json", mime::APPLICATION_JSON.as_ref(), r#"{"zip":"world"}"#),
        request(Method::GET, "/users?page=2&size=20", mime::TEXT_PLAIN.as_ref(), ""),
        request(Method::GET, "/users/abc", mime::TEXT_PLAIN.as_ref(), ""),
        request(Method::GET, "/users/0", mime::TEXT_PLAIN.as_ref(), ""),
        request(Method::DELETE, "/users/7", mime::TEXT_PLAIN.as_ref(), ""),
    ];

    for req in requests {
        let line = format!("{} {}", req.method(), req.uri());
        let response = router.handle(req).await;
        println!("{line} -> {} {}", response.status(), String::from_utf8_lossy(response.body().as_bytes()));
    }
}
