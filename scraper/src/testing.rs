use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    parse::{ParseError, Row},
    query::{Query, ReferenceData},
    transport::{FetchError, Transport},
    PAGE_SIZE,
};

/// A scripted failure for one attempt at a page.
pub(crate) enum Reply {
    Status(u16),
    Malformed,
}

impl Reply {
    fn into_error(self) -> FetchError {
        match self {
            Reply::Status(code) => {
                FetchError::Status(StatusCode::from_u16(code).expect("valid status code"))
            }
            Reply::Malformed => ParseError::MissingField("courselist").into(),
        }
    }
}

/// In-memory backend serving `total` synthetic rows. Pages succeed unless a
/// failure was scripted for them; every attempt is counted.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    total: usize,
    count_failures: AtomicU32,
    count_attempts: AtomicU32,
    reference_failures: AtomicU32,
    scripts: Mutex<HashMap<usize, VecDeque<Reply>>>,
    failing: HashSet<usize>,
    delays: HashMap<usize, Duration>,
    attempts: Mutex<HashMap<usize, u32>>,
}

impl ScriptedTransport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Replies for the next attempts at `start_row`, before it starts succeeding.
    pub fn script(self, start_row: usize, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(start_row)
            .or_default()
            .extend(replies);
        self
    }

    pub fn failing(mut self, start_row: usize) -> Self {
        self.failing.insert(start_row);
        self
    }

    pub fn delay(mut self, start_row: usize, delay: Duration) -> Self {
        self.delays.insert(start_row, delay);
        self
    }

    pub fn count_failures(self, n: u32) -> Self {
        self.count_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn reference_failures(self, n: u32) -> Self {
        self.reference_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn page_attempts(&self, start_row: usize) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&start_row)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_page_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub fn count_attempts(&self) -> u32 {
        self.count_attempts.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

pub(crate) fn row(index: usize) -> Row {
    Row {
        sequence: (index + 1).to_string(),
        course_code: format!("{:08}", 100 + index),
        course_name: format!("课程{index}"),
        course_type: "专业课".to_owned(),
        offering_unit: "数学科学学院".to_owned(),
        class_number: "1".to_owned(),
        credits: "2.0".to_owned(),
        plan_id: format!("22-23-1-{index}"),
        weeks: "1-16".to_owned(),
        schedule: "周一(第1节-第2节)".to_owned(),
        teacher: "张三".to_owned(),
        remarks: String::new(),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_count(&self, _query: &Query) -> Result<usize, FetchError> {
        self.count_attempts.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.count_failures) {
            return Err(Reply::Status(500).into_error());
        }
        Ok(self.total)
    }

    async fn fetch_page(&self, _query: &Query, start_row: usize) -> Result<Vec<Row>, FetchError> {
        *self.attempts.lock().unwrap().entry(start_row).or_default() += 1;

        if let Some(delay) = self.delays.get(&start_row) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&start_row) {
            return Err(Reply::Status(503).into_error());
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&start_row)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = scripted {
            return Err(reply.into_error());
        }

        let end = (start_row + PAGE_SIZE).min(self.total);
        Ok((start_row..end).map(row).collect())
    }

    async fn fetch_reference_data(&self) -> Result<ReferenceData, FetchError> {
        if Self::take_failure(&self.reference_failures) {
            return Err(Reply::Status(502).into_error());
        }

        let all = BTreeMap::from([("0".to_owned(), "全部".to_owned())]);
        Ok(ReferenceData {
            departments: all.clone(),
            course_types: all,
        })
    }
}
