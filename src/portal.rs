//! Read-through facade over [`ApiClient`] that keeps detail views and the
//! institutional overview in query caches, and drops them after mutations.

use std::sync::Arc;

use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{
    EntityKind, InstitutionalOverview, MessageResponse, StaffDetail, StudentDetail,
};
use crate::resource::{LoadState, QueryCache};

const OVERVIEW_KEY: &str = "overview";
const PROFILE_KEY: &str = "me";

pub struct Portal {
    api: Arc<ApiClient>,
    overview: QueryCache<Option<InstitutionalOverview>>,
    students: QueryCache<StudentDetail>,
    staff: QueryCache<StaffDetail>,
}

impl Portal {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            overview: QueryCache::new(),
            students: QueryCache::new(),
            staff: QueryCache::new(),
        }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// `None` means the server has no data yet.
    pub async fn overview(&self) -> Result<Arc<Option<InstitutionalOverview>>> {
        let api = &self.api;
        self.overview.load(OVERVIEW_KEY, || api.overview()).await
    }

    pub fn overview_state(&self) -> LoadState<Option<InstitutionalOverview>> {
        self.overview.state(OVERVIEW_KEY)
    }

    pub async fn student(&self, id: Uuid) -> Result<Arc<StudentDetail>> {
        let api = &self.api;
        self.students
            .load(&id.to_string(), || api.student_detail(id))
            .await
    }

    pub async fn staff(&self, id: Uuid) -> Result<Arc<StaffDetail>> {
        let api = &self.api;
        self.staff
            .load(&id.to_string(), || api.staff_detail(id))
            .await
    }

    pub fn staff_state(&self, id: Uuid) -> LoadState<StaffDetail> {
        self.staff.state(&id.to_string())
    }

    /// The logged-in student's own profile.
    pub async fn student_profile(&self) -> Result<Arc<StudentDetail>> {
        let api = &self.api;
        self.students
            .load(PROFILE_KEY, || api.student_profile())
            .await
    }

    pub async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<MessageResponse> {
        let response = match kind {
            EntityKind::Student => self.api.delete_student(id).await?,
            EntityKind::Staff => self.api.delete_staff(id).await?,
        };
        self.invalidate(kind, id);
        Ok(response)
    }

    /// Forgets everything derived from `id`, including the aggregate overview.
    pub fn invalidate(&self, kind: EntityKind, id: Uuid) {
        let key = id.to_string();
        match kind {
            EntityKind::Student => self.students.invalidate(&key),
            EntityKind::Staff => self.staff.invalidate(&key),
        }
        self.overview.invalidate(OVERVIEW_KEY);
    }

    pub fn clear(&self) {
        self.overview.clear();
        self.students.clear();
        self.staff.clear();
    }
}
