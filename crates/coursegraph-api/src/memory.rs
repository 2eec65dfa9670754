use crate::client::AggregationClient;
use crate::dto::{AggregateRow, AggregationRequest};
use crate::errors::FetchError;
use coursegraph_core::{ChildKey, CourseId, GroupId, Level, MajorId, ResourceType};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// Catalog fixture
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub groups: Vec<GroupFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFixture {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub majors: Vec<MajorFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MajorFixture {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub courses: Vec<CourseFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseFixture {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub resources: Vec<TypeFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeFixture {
    pub resource_type: String,
    #[serde(default)]
    pub label: Option<String>,
    pub count: u64,
}

impl CourseFixture {
    fn total(&self) -> u64 {
        self.resources.iter().map(|t| t.count).sum()
    }
}

impl MajorFixture {
    fn total(&self) -> u64 {
        self.courses.iter().map(CourseFixture::total).sum()
    }
}

impl GroupFixture {
    fn total(&self) -> u64 {
        self.majors.iter().map(MajorFixture::total).sum()
    }
}

impl CatalogFixture {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Build a uniform catalog. Ids are assigned globally per level, starting
    /// at 1, so every entity has a unique natural key.
    pub fn synthetic(
        groups: usize,
        majors_per_group: usize,
        courses_per_major: usize,
        types_per_course: usize,
    ) -> Self {
        let mut next_major = 1;
        let mut next_course = 1;
        let groups = (1..=groups as i64)
            .map(|g| GroupFixture {
                id: g,
                name: format!("Group {g}"),
                majors: (0..majors_per_group)
                    .map(|_| {
                        let major_id = next_major;
                        next_major += 1;
                        MajorFixture {
                            id: major_id,
                            name: format!("Major {major_id}"),
                            courses: (0..courses_per_major)
                                .map(|_| {
                                    let course_id = next_course;
                                    next_course += 1;
                                    CourseFixture {
                                        id: course_id,
                                        name: format!("Course {course_id}"),
                                        resources: (0..types_per_course)
                                            .map(|t| TypeFixture {
                                                resource_type: format!("type{t}"),
                                                label: None,
                                                count: (t + 1) as u64,
                                            })
                                            .collect(),
                                    }
                                })
                                .collect(),
                        }
                    })
                    .collect(),
            })
            .collect();
        Self { groups }
    }

    fn majors<'a>(
        &'a self,
        group_id: Option<GroupId>,
    ) -> impl Iterator<Item = (&'a GroupFixture, &'a MajorFixture)> + 'a {
        self.groups
            .iter()
            .filter(move |g| group_id.is_none_or(|id| id.0 == g.id))
            .flat_map(|g| g.majors.iter().map(move |m| (g, m)))
    }

    fn courses<'a>(
        &'a self,
        group_id: Option<GroupId>,
        major_id: Option<MajorId>,
    ) -> impl Iterator<Item = &'a CourseFixture> + 'a {
        self.majors(group_id)
            .filter(move |(_, m)| major_id.is_none_or(|id| id.0 == m.id))
            .flat_map(|(_, m)| m.courses.iter())
    }

    /// Answer an aggregation request before `limit` and `include_empty`
    /// are applied.
    fn rows_for(&self, request: &AggregationRequest) -> Vec<AggregateRow> {
        match request.level {
            Level::Group => self
                .groups
                .iter()
                .map(|g| AggregateRow::new(ChildKey::Group(GroupId(g.id)), &g.name, g.total()))
                .collect(),
            Level::Major => self
                .majors(request.group_id)
                .map(|(_, m)| AggregateRow::new(ChildKey::Major(MajorId(m.id)), &m.name, m.total()))
                .collect(),
            Level::Course => self
                .courses(request.group_id, request.major_id)
                .map(|c| AggregateRow::new(ChildKey::Course(CourseId(c.id)), &c.name, c.total()))
                .collect(),
            Level::Type => {
                let mut rows: Vec<AggregateRow> = Vec::new();
                let courses = self
                    .courses(request.group_id, request.major_id)
                    .filter(|c| request.course_id.is_none_or(|id| id.0 == c.id));
                for resource in courses.flat_map(|c| c.resources.iter()) {
                    let key = ChildKey::Type(ResourceType::new(&resource.resource_type));
                    match rows.iter_mut().find(|row| row.key == key) {
                        Some(row) => row.count += resource.count,
                        None => {
                            let label = resource
                                .label
                                .clone()
                                .unwrap_or_else(|| resource.resource_type.clone());
                            rows.push(AggregateRow::new(key, label, resource.count));
                        }
                    }
                }
                rows
            }
        }
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug)]
struct FailureRule {
    level: Level,
    remaining: Option<usize>,
    error: FetchError,
}

/// In-process aggregation client answering from a [`CatalogFixture`].
///
/// Records every request it sees and can be told to fail requests for a
/// given level, which makes it the test double for the navigator as well as
/// the offline data source of the CLI.
#[derive(Debug, Default)]
pub struct MemoryAggregationClient {
    catalog: CatalogFixture,
    failures: Mutex<Vec<FailureRule>>,
    requests: Mutex<Vec<AggregationRequest>>,
    calls: AtomicUsize,
}

impl MemoryAggregationClient {
    pub fn new(catalog: CatalogFixture) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }

    pub fn catalog(&self) -> &CatalogFixture {
        &self.catalog
    }

    /// Fail the next `times` requests for `level` with `error`.
    pub fn fail_level(&self, level: Level, times: usize, error: FetchError) {
        if times == 0 {
            return;
        }
        self.failures.lock().push(FailureRule {
            level,
            remaining: Some(times),
            error,
        });
    }

    /// Fail every request for `level` until [`clear_failures`] is called.
    ///
    /// [`clear_failures`]: Self::clear_failures
    pub fn fail_level_always(&self, level: Level, error: FetchError) {
        self.failures.lock().push(FailureRule {
            level,
            remaining: None,
            error,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AggregationRequest> {
        self.requests.lock().clone()
    }

    fn injected_failure(&self, level: Level) -> Option<FetchError> {
        let mut failures = self.failures.lock();
        let index = failures.iter().position(|rule| rule.level == level)?;
        let error = failures[index].error.clone();
        let exhausted = match failures[index].remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            failures.remove(index);
        }
        Some(error)
    }

    fn answer(&self, request: &AggregationRequest) -> Result<Vec<AggregateRow>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(error) = self.injected_failure(request.level) {
            tracing::debug!(level = %request.level, %error, "injected aggregation failure");
            return Err(error);
        }

        let mut rows = self.catalog.rows_for(request);
        if !request.include_empty {
            rows.retain(|row| row.count > 0);
        }
        rows.truncate(request.limit);
        Ok(rows)
    }
}

impl AggregationClient for MemoryAggregationClient {
    fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> impl Future<Output = Result<Vec<AggregateRow>, FetchError>> + Send {
        std::future::ready(self.answer(request))
    }
}
