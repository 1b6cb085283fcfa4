//! Per-request convenience façade.
//!
//! `RequestUtils` is an extractor: take it as a handler argument and it
//! owns the request and its (unread) body for the rest of the handler.
//!
//! ```ignore
//! async fn update(mut utils: RequestUtils) -> Result<HttpResponse, WebError> {
//!     let id = utils.id();
//!     let body = utils.json_map().await?;
//!     utils.render_json(&json!({ "id": id, "fields": body.len() }))
//! }
//! ```

use std::collections::HashMap;
use std::future::{ready, Ready};
use std::path::Path;

use actix_web::dev::Payload;
use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use bytes::Bytes;
use lazy_regex::regex_captures;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;
use url::form_urlencoded;

use super::download::file_response;
use super::json_body;
use super::views::{normalize_view_path, ViewEngine};
use crate::error::WebError;
use crate::trace_ctx;

/// Default cap on request bodies read through [`RequestUtils`].
pub const DEFAULT_BODY_LIMIT: usize = 256 * 1024;

const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Name of the authenticated user, inserted into the request extensions by
/// whatever authenticates the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

/// App-level settings for [`RequestUtils`], registered with
/// `App::app_data`.
#[derive(Debug, Clone)]
pub struct RequestUtilsConfig {
    pub body_limit: usize,
}

impl Default for RequestUtilsConfig {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

pub struct RequestUtils {
    req: HttpRequest,
    payload: Payload,
    body: Option<Bytes>,
    id: Option<i64>,
    body_limit: usize,
}

impl RequestUtils {
    pub fn new(req: HttpRequest, payload: Payload) -> Self {
        let id = id_from_path(req.path());
        Self {
            req,
            payload,
            body: None,
            id,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn request(&self) -> &HttpRequest {
        &self.req
    }

    /// Numeric id ending the path: `/clientes/autorizar/33` gives `33`.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Scheme, host and port the app is served from, e.g.
    /// `https://example.com:8082`.
    pub fn base_url(&self) -> String {
        let info = self.req.connection_info();
        let path_and_query = self
            .req
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        let full = format!("{}://{}{}", info.scheme(), info.host(), path_and_query);
        base_url_from(&full, self.req.path())
    }

    /// Whether the request was sent as XMLHttpRequest.
    pub fn is_xhr(&self) -> bool {
        self.req
            .headers()
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    pub fn remote_user(&self) -> Option<String> {
        self.req
            .extensions()
            .get::<RemoteUser>()
            .map(|user| user.0.clone())
    }

    /// Query and form parameters, first value wins, query before form.
    ///
    /// The path id, when present, is added as `id` and replaces any
    /// parameter of that name. Form bodies are read only for
    /// `application/x-www-form-urlencoded` requests.
    pub async fn params_first(&mut self) -> Result<HashMap<String, String>, WebError> {
        let form = if self.has_form_body() {
            Some(self.body().await?)
        } else {
            None
        };
        Ok(first_values(
            self.req.query_string(),
            form.as_deref(),
            self.id,
        ))
    }

    /// Body parsed as JSON into `T`. The Content-Type must be JSON; the body
    /// is not touched otherwise.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, WebError> {
        json_body::ensure_json_content_type(&self.req)?;
        let body = self.body().await?;
        json_body::parse(&body)
    }

    /// Body as a JSON object.
    pub async fn json_map(&mut self) -> Result<Map<String, Value>, WebError> {
        self.json().await
    }

    /// Body as a JSON array.
    pub async fn json_list(&mut self) -> Result<Vec<Value>, WebError> {
        self.json().await
    }

    /// Body as a JSON array of objects.
    pub async fn json_maps(&mut self) -> Result<Vec<Map<String, Value>>, WebError> {
        self.json().await
    }

    pub fn render_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<HttpResponse, WebError> {
        self.render_json_with_status(value, StatusCode::OK)
    }

    /// JSON response with `status`, UTF-8 content type and `no-cache`.
    pub fn render_json_with_status<T: Serialize + ?Sized>(
        &self,
        value: &T,
        status: StatusCode,
    ) -> Result<HttpResponse, WebError> {
        let json = serde_json::to_string(value).map_err(|e| {
            error!(error = %e, "Could not serialize JSON response");
            WebError::internal(format!("json serialization: {e}"))
        })?;

        Ok(HttpResponse::build(status)
            .insert_header((CONTENT_TYPE, "application/json; charset=utf-8"))
            .insert_header((CACHE_CONTROL, "no-cache"))
            .body(json))
    }

    /// Render the view at `path` to a string.
    pub fn merge_template<T: Serialize + ?Sized>(
        &self,
        path: &str,
        ctx: &T,
    ) -> Result<String, WebError> {
        let views = self
            .req
            .app_data::<web::Data<dyn ViewEngine>>()
            .cloned()
            .ok_or_else(|| WebError::internal("No view engine registered"))?;
        let ctx = serde_json::to_value(ctx).map_err(|e| WebError::template(e.to_string()))?;

        views.render(path, &ctx).map_err(|e| {
            error!(
                request_id = %trace_ctx::request_id(),
                view = %normalize_view_path(path),
                error = %e,
                "View rendering failed"
            );
            WebError::template(e.to_string())
        })
    }

    /// Render the view at `path` as an HTML response.
    pub fn render_template<T: Serialize + ?Sized>(
        &self,
        path: &str,
        ctx: &T,
    ) -> Result<HttpResponse, WebError> {
        let html = self.merge_template(path, ctx)?;
        Ok(HttpResponse::Ok()
            .insert_header((CONTENT_TYPE, "text/html; charset=utf-8"))
            .body(html))
    }

    /// The file's bytes as the response body; see [`file_response`].
    pub async fn render_file(
        &self,
        path: impl AsRef<Path>,
        delete: bool,
    ) -> Result<HttpResponse, WebError> {
        file_response(path.as_ref(), None, delete).await
    }

    /// Like [`render_file`](Self::render_file), saved by the client as
    /// `download_name`.
    pub async fn render_file_download(
        &self,
        path: impl AsRef<Path>,
        download_name: &str,
        delete: bool,
    ) -> Result<HttpResponse, WebError> {
        file_response(path.as_ref(), Some(download_name), delete).await
    }

    pub fn log_error(&self, err: &dyn std::error::Error) {
        error!(
            request_id = %trace_ctx::request_id(),
            path = %self.req.path(),
            error = %err,
            "Error"
        );
    }

    fn has_form_body(&self) -> bool {
        self.req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with(FORM_MEDIA_TYPE))
    }

    /// Request body, read once and kept for later calls.
    async fn body(&mut self) -> Result<Bytes, WebError> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }
        let body = json_body::read_body(&mut self.payload, self.body_limit).await?;
        self.body = Some(body.clone());
        Ok(body)
    }
}

impl FromRequest for RequestUtils {
    type Error = WebError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let limit = req
            .app_data::<RequestUtilsConfig>()
            .map_or(DEFAULT_BODY_LIMIT, |cfg| cfg.body_limit);

        ready(Ok(
            RequestUtils::new(req.clone(), payload.take()).with_body_limit(limit)
        ))
    }
}

/// Trailing `/<digits>` of `path`, if it fits in an `i64`.
pub fn id_from_path(path: &str) -> Option<i64> {
    let (_, digits) = regex_captures!(r"/([0-9]+)$", path)?;
    digits.parse().ok()
}

/// `full_url` without its query, fragment and trailing `uri`.
pub fn base_url_from(full_url: &str, uri: &str) -> String {
    let end = full_url.find(['?', '#']).unwrap_or(full_url.len());
    let without_query = &full_url[..end];
    without_query
        .strip_suffix(uri)
        .unwrap_or(without_query)
        .to_string()
}

/// First-value-wins parameter map; `id` overrides any same-named parameter.
pub fn first_values(query: &str, form: Option<&[u8]>, id: Option<i64>) -> HashMap<String, String> {
    let mut params = HashMap::new();

    let pairs = form_urlencoded::parse(query.as_bytes())
        .chain(form.into_iter().flat_map(|body| form_urlencoded::parse(body)));
    for (name, value) in pairs {
        params
            .entry(name.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    if let Some(id) = id {
        params.insert("id".to_string(), id.to_string());
    }
    params
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;
    use serde::Deserialize;

    use super::*;

    fn utils(req: TestRequest) -> RequestUtils {
        let (req, payload) = req.to_http_parts();
        RequestUtils::new(req, payload)
    }

    #[test]
    fn test_id_from_path() {
        assert_eq!(id_from_path("/clientes/autorizar/33"), Some(33));
        assert_eq!(id_from_path("/clientes/autorizar/"), None);
        assert_eq!(id_from_path("/clientes/autorizar"), None);
        assert_eq!(id_from_path("/33/editar"), None);
        assert_eq!(id_from_path("/x/99999999999999999999999"), None);
    }

    #[test]
    fn test_first_values_injects_id() {
        let params = first_values("a=1", None, Some(33));
        assert_eq!(params.len(), 2);
        assert_eq!(params["a"], "1");
        assert_eq!(params["id"], "33");
    }

    #[test]
    fn test_first_values_id_overrides_parameter() {
        let params = first_values("id=7&b=2", None, Some(33));
        assert_eq!(params["id"], "33");

        let params = first_values("id=7", None, None);
        assert_eq!(params["id"], "7");
    }

    #[test]
    fn test_first_values_first_wins_query_before_form() {
        let params = first_values("a=1&a=2", Some(b"a=3&c=x+y"), None);
        assert_eq!(params["a"], "1");
        assert_eq!(params["c"], "x y");
    }

    #[test]
    fn test_base_url_from() {
        assert_eq!(
            base_url_from(
                "https://example.com:8082/webapp/modulo/accion?query=123",
                "/webapp/modulo/accion"
            ),
            "https://example.com:8082"
        );
        assert_eq!(
            base_url_from("http://localhost/", "/"),
            "http://localhost"
        );
    }

    #[test]
    fn test_base_url_from_request() {
        let utils = utils(
            TestRequest::get()
                .uri("/webapp/modulo/accion?query=123")
                .insert_header(("host", "example.com:8082")),
        );
        assert_eq!(utils.base_url(), "http://example.com:8082");
    }

    #[test]
    fn test_is_xhr_ignores_case() {
        let xhr = utils(TestRequest::default().insert_header(("X-Requested-With", "xmlhttprequest")));
        assert!(xhr.is_xhr());

        let other = utils(TestRequest::default().insert_header(("x-requested-with", "fetch")));
        assert!(!other.is_xhr());

        assert!(!utils(TestRequest::default()).is_xhr());
    }

    #[test]
    fn test_remote_user_from_extensions() {
        let utils = utils(TestRequest::default());
        assert_eq!(utils.remote_user(), None);

        utils
            .request()
            .extensions_mut()
            .insert(RemoteUser("mpp".to_string()));
        assert_eq!(utils.remote_user().as_deref(), Some("mpp"));
    }

    #[actix_web::test]
    async fn test_json_rejects_non_json_without_reading_body() {
        let mut utils = utils(
            TestRequest::post()
                .insert_header(("content-type", "text/plain"))
                .set_payload(r#"{"a": 1}"#),
        );

        let err = utils.json_map().await.unwrap_err();
        assert!(matches!(err, WebError::ContentType { .. }));
        assert!(utils.body.is_none());

        // The untouched payload is still readable.
        let body = json_body::read_body(&mut utils.payload, DEFAULT_BODY_LIMIT)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"a": 1}"#);
    }

    #[actix_web::test]
    async fn test_json_variants() {
        let mut map = utils(
            TestRequest::post()
                .insert_header(("content-type", "application/json"))
                .set_payload(r#"{"a": 1}"#),
        );
        assert_eq!(map.json_map().await.unwrap()["a"], 1);
        // Body is cached after the first read.
        assert_eq!(map.json_map().await.unwrap()["a"], 1);

        let mut list = utils(
            TestRequest::post()
                .insert_header(("content-type", "application/json"))
                .set_payload("[1, 2, 3]"),
        );
        assert_eq!(list.json_list().await.unwrap().len(), 3);

        let mut maps = utils(
            TestRequest::post()
                .insert_header(("content-type", "application/json"))
                .set_payload(r#"[{"a": 1}, {"b": 2}]"#),
        );
        let maps = maps.json_maps().await.unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1]["b"], 2);
    }

    #[actix_web::test]
    async fn test_typed_json() {
        #[derive(Deserialize)]
        struct Cliente {
            nombre: String,
        }

        let mut utils = utils(
            TestRequest::post()
                .insert_header(("content-type", "application/json; charset=utf-8"))
                .set_payload(r#"{"nombre": "Ana"}"#),
        );
        let cliente: Cliente = utils.json().await.unwrap();
        assert_eq!(cliente.nombre, "Ana");
    }

    #[actix_web::test]
    async fn test_params_first_reads_form_body() {
        let mut utils = utils(
            TestRequest::post()
                .uri("/clientes/autorizar/33?a=1")
                .insert_header(("content-type", "application/x-www-form-urlencoded"))
                .set_payload("a=2&b=3&id=9"),
        );

        let params = utils.params_first().await.unwrap();
        assert_eq!(params["a"], "1");
        assert_eq!(params["b"], "3");
        assert_eq!(params["id"], "33");
    }

    #[actix_web::test]
    async fn test_params_first_ignores_non_form_body() {
        let mut utils = utils(
            TestRequest::post()
                .uri("/items?a=1")
                .insert_header(("content-type", "application/json"))
                .set_payload(r#"{"b": 2}"#),
        );

        let params = utils.params_first().await.unwrap();
        assert_eq!(params.len(), 1);
        assert!(utils.body.is_none());
    }

    #[actix_web::test]
    async fn test_render_json_headers() {
        let utils = utils(TestRequest::default());
        let resp = utils
            .render_json_with_status(&serde_json::json!({"ok": true}), StatusCode::CREATED)
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
    }

    #[test]
    fn test_merge_template_without_engine_is_internal() {
        let utils = utils(TestRequest::default());
        let err = utils.merge_template("/x.html", &()).unwrap_err();
        assert!(matches!(err, WebError::Internal { .. }));
    }
}
