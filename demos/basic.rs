//! Minimal switchyard app: inline handlers, a controller, and fallbacks.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i -X DELETE http://localhost:3000/users/42     # 405, Allow: GET, POST
//!   curl -i http://localhost:3000/orders/42              # 404
//!   curl -i http://localhost:3000/admin                  # 401 via explicit stop
//!   curl -i http://localhost:3000/reports/q3             # controller action

use std::sync::Arc;

use switchyard::handler::{self, BoxFuture, to};
use switchyard::{
    Abort, Container, Controller, Dispatcher, Request, Response, Router, Server, Settings,
    StatusCode, handlers,
};

#[tokio::main]
async fn main() -> Result<(), switchyard::Error> {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_toml_str("host = \"127.0.0.1\"\nport = 3000")?;

    let mut routes = Router::new();
    routes.get("/users/{id}", get_user);
    routes.post("/users/{id}", update_user);
    routes.get("/admin", admin);
    routes.get("/reports/{period}", to("Reports:show"));

    let mut container = Container::new();
    container.insert("company", "Acme".to_owned());
    container.register_controller::<Reports>("Reports");
    container.set_not_found_handler(handlers::not_found);
    container.set_not_allowed_handler(handlers::not_allowed);
    container.set_error_handler(handlers::internal_error);

    let dispatcher = Dispatcher::new(routes, container)?;
    Server::from_settings(&settings)?.serve(dispatcher).await
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#))
}

// POST /users/{id}
async fn update_user(req: Request) -> Result<Response, Abort> {
    if req.body().is_empty() {
        return Err(Abort::stop(StatusCode::BAD_REQUEST));
    }
    Ok(Response::status(StatusCode::NO_CONTENT))
}

// GET /admin → stops early with 401 unless credentials are sent
async fn admin(req: Request) -> Result<&'static str, Abort> {
    if req.header("authorization").is_none() {
        return Err(Abort::stop(StatusCode::UNAUTHORIZED));
    }
    Ok("welcome")
}

struct Reports {
    company: Arc<String>,
}

impl Controller for Reports {
    fn new(container: Arc<Container>) -> Self {
        let company = container.get::<String>("company").unwrap_or_default();
        Self { company }
    }

    fn call(self, action: &str, req: Request) -> Option<BoxFuture> {
        match action {
            "show" => Some(handler::boxed(async move {
                let period = req.param("period").unwrap_or("all");
                format!("{} report for {period}", self.company)
            })),
            _ => None,
        }
    }
}
