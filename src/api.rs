//! Typed client for the portal REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::directory::DirectoryBackend;
use crate::error::{ApiError, Result};
use crate::models::{
    DirectoryEntry, EntityKind, FeedbackCreate, FeedbackReceipt, InstitutionalOverview,
    MessageResponse, RegisterRequest, Staff, StaffCreate, StaffDetail, Student, StudentCreate,
    StudentDetail, StudyPlanDay, Todo, TodoCreate, TodoToggle, Token, User,
};
use crate::session::{Session, SessionStore};

/// Filters for `GET /admin/students`. Empty values are left off the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub search: Option<String>,
    pub department: Option<String>,
    pub year: Option<u8>,
}

impl StudentFilter {
    pub fn search(query: &str) -> Self {
        Self {
            search: Some(query.to_string()),
            ..Self::default()
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_non_empty(&mut pairs, "search", self.search.as_deref());
        push_non_empty(&mut pairs, "department", self.department.as_deref());
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        pairs
    }
}

/// Filters for `GET /admin/staff`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaffFilter {
    pub search: Option<String>,
    pub department: Option<String>,
}

impl StaffFilter {
    pub fn search(query: &str) -> Self {
        Self {
            search: Some(query.to_string()),
            ..Self::default()
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_non_empty(&mut pairs, "search", self.search.as_deref());
        push_non_empty(&mut pairs, "department", self.department.as_deref());
        pairs
    }
}

fn entity_path(kind: EntityKind, id: Uuid) -> String {
    format!("/admin/{}/{id}", kind.path_segment())
}

fn push_non_empty(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        pairs.push((key, value.to_string()));
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http.request(method, url)
    }

    /// Attaches the bearer token, read from the session at call time.
    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.session.token()?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let value = self.execute_raw(builder, context).await?;
        serde_json::from_value(value).map_err(|err| ApiError::decode(context, err))
    }

    async fn execute_raw(&self, builder: RequestBuilder, context: &str) -> Result<Value> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        let response = self.http.execute(request).await.map_err(|err| {
            warn!(%method, %path, error = %err, "request failed");
            ApiError::Network(err)
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(%method, %path, status, "api response");
        let result = decode_body(status, &body, context);
        if let Err(err) = &result {
            warn!(%method, %path, status, error = %err, "api call rejected");
        }
        result
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        context: &str,
    ) -> Result<T> {
        let builder = self.authorized(Method::GET, path)?.query(query);
        self.execute(builder, context).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<T> {
        let builder = self.authorized(method, path)?.json(body);
        self.execute(builder, context).await
    }

    async fn delete_path(&self, path: &str, context: &str) -> Result<MessageResponse> {
        let builder = self.authorized(Method::DELETE, path)?;
        self.execute(builder, context).await
    }

    /// Exchanges credentials for a token, resolves the role and only then
    /// establishes the session.
    #[instrument(name = "portal_login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let form = [("username", email), ("password", password)];
        let token: Token = self
            .execute(self.request(Method::POST, "/auth/token").form(&form), "token")
            .await?;
        let user: User = self
            .execute(
                self.request(Method::GET, "/users/me")
                    .bearer_auth(&token.access_token),
                "user",
            )
            .await?;
        let session = Session {
            token: token.access_token,
            role: user.role,
        };
        self.session.establish(session.clone())?;
        Ok(session)
    }

    pub fn logout(&self) -> Result<bool> {
        self.session.logout()
    }

    pub async fn me(&self) -> Result<User> {
        self.get("/users/me", &[], "user").await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        let builder = self.request(Method::POST, "/users/").json(request);
        self.execute(builder, "user").await
    }

    /// `None` when the institution has no data yet (the API answers `{}`).
    pub async fn overview(&self) -> Result<Option<InstitutionalOverview>> {
        let builder = self.authorized(Method::GET, "/admin/overview")?;
        let value = self.execute_raw(builder, "overview").await?;
        if value.as_object().is_some_and(|fields| fields.is_empty()) {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| ApiError::decode("overview", err))
    }

    pub async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>> {
        self.get("/admin/students", &filter.query_pairs(), "student list")
            .await
    }

    pub async fn create_student(&self, request: &StudentCreate) -> Result<Student> {
        self.send(Method::POST, "/admin/students", request, "student")
            .await
    }

    pub async fn delete_student(&self, id: Uuid) -> Result<MessageResponse> {
        self.delete_path(&entity_path(EntityKind::Student, id), "delete")
            .await
    }

    pub async fn student_detail(&self, id: Uuid) -> Result<StudentDetail> {
        self.get(&entity_path(EntityKind::Student, id), &[], "student detail")
            .await
    }

    pub async fn list_staff(&self, filter: &StaffFilter) -> Result<Vec<Staff>> {
        self.get("/admin/staff", &filter.query_pairs(), "staff list")
            .await
    }

    pub async fn create_staff(&self, request: &StaffCreate) -> Result<Staff> {
        self.send(Method::POST, "/admin/staff", request, "staff").await
    }

    pub async fn delete_staff(&self, id: Uuid) -> Result<MessageResponse> {
        self.delete_path(&entity_path(EntityKind::Staff, id), "delete")
            .await
    }

    pub async fn staff_detail(&self, id: Uuid) -> Result<StaffDetail> {
        self.get(&entity_path(EntityKind::Staff, id), &[], "staff detail")
            .await
    }

    pub async fn my_staff_profile(&self) -> Result<Staff> {
        self.get("/staff/my-profile", &[], "staff profile").await
    }

    pub async fn faculty_students(&self, year: Option<u8>) -> Result<Vec<Student>> {
        let query: Vec<(&'static str, String)> =
            year.map(|y| ("year", y.to_string())).into_iter().collect();
        self.get("/staff/students", &query, "student list").await
    }

    pub async fn submit_feedback(&self, feedback: &FeedbackCreate) -> Result<FeedbackReceipt> {
        self.send(Method::POST, "/staff/feedback", feedback, "feedback")
            .await
    }

    pub async fn student_profile(&self) -> Result<StudentDetail> {
        self.get("/student/profile", &[], "student profile").await
    }

    pub async fn todos(&self) -> Result<Vec<Todo>> {
        self.get("/student/todos", &[], "todo list").await
    }

    pub async fn add_todo(&self, todo: &TodoCreate) -> Result<Todo> {
        self.send(Method::POST, "/student/todos", todo, "todo").await
    }

    pub async fn toggle_todo(&self, id: Uuid) -> Result<TodoToggle> {
        let builder = self.authorized(Method::PATCH, &format!("/student/todos/{id}"))?;
        self.execute(builder, "todo toggle").await
    }

    pub async fn study_plan(&self) -> Result<Vec<StudyPlanDay>> {
        self.get("/student/study-plan", &[], "study plan").await
    }
}

#[async_trait]
impl DirectoryBackend for ApiClient {
    async fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<DirectoryEntry>> {
        match kind {
            EntityKind::Student => Ok(self
                .list_students(&StudentFilter::search(query))
                .await?
                .into_iter()
                .map(DirectoryEntry::Student)
                .collect()),
            EntityKind::Staff => Ok(self
                .list_staff(&StaffFilter::search(query))
                .await?
                .into_iter()
                .map(DirectoryEntry::Staff)
                .collect()),
        }
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<()> {
        match kind {
            EntityKind::Student => self.delete_student(id).await?,
            EntityKind::Staff => self.delete_staff(id).await?,
        };
        Ok(())
    }
}

/// Maps a raw response to a typed value. Non-2xx statuses keep the server's
/// `detail`; a 2xx `{"error": ...}` envelope is a rejection, not data.
pub(crate) fn decode_body(status: u16, body: &str, context: &str) -> Result<Value> {
    if !(200..300).contains(&status) {
        return Err(ApiError::Status {
            status,
            detail: extract_detail(body),
        });
    }
    let value: Value =
        serde_json::from_str(body).map_err(|err| ApiError::decode(context, err))?;
    if let Some(message) = error_envelope(&value) {
        return Err(ApiError::Rejected(message));
    }
    Ok(value)
}

fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        // Request validation failures arrive as a list of {loc, msg}.
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn error_envelope(value: &Value) -> Option<String> {
    let fields = value.as_object()?;
    if fields.len() != 1 {
        return None;
    }
    fields.get("error")?.as_str().map(str::to_string)
}
