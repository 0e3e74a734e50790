//! Query-string builders for listing and data endpoints

use url::form_urlencoded;

/// Sort order of data points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Parameters of `/sensors.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorListQuery {
    pub page: u32,
    pub per_page: u32,
    pub shared: bool,
    pub owned: bool,
    pub physical: bool,
    pub full_details: bool,
}

impl SensorListQuery {
    /// Page size of the single-page owned physical listing
    pub const SINGLE_PAGE_SIZE: u32 = 1000;
    /// Page size used when walking every owned sensor
    pub const WALK_PAGE_SIZE: u32 = 100;

    /// First and only page of owned physical sensors
    pub fn owned_physical() -> Self {
        Self {
            page: 0,
            per_page: Self::SINGLE_PAGE_SIZE,
            shared: false,
            owned: true,
            physical: true,
            full_details: true,
        }
    }

    /// Page `page` of all owned sensors, physical or not
    pub fn owned_page(page: u32) -> Self {
        Self {
            page,
            per_page: Self::WALK_PAGE_SIZE,
            shared: false,
            owned: true,
            physical: false,
            full_details: true,
        }
    }

    pub fn encode(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("page", &self.page.to_string())
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("shared", flag(self.shared))
            .append_pair("owned", flag(self.owned))
            .append_pair("physical", flag(self.physical));
        if self.full_details {
            query.append_pair("details", "full");
        }
        query.finish()
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Filters for sensor data reads
///
/// Unset fields are left out of the request so the service applies its own
/// defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Inclusive lower bound, seconds since the epoch
    pub start_date: Option<f64>,
    /// Exclusive upper bound, seconds since the epoch
    pub end_date: Option<f64>,
    /// Point closest to this date
    pub date: Option<f64>,
    /// Only the most recent point
    pub last: Option<bool>,
    pub sort: Option<SortOrder>,
    /// Aggregation interval in seconds
    pub interval: Option<u32>,
    /// Ask the service to include the total count
    pub total: Option<bool>,
    /// Additional parameters, sent in insertion order
    pub extra: Vec<(String, String)>,
}

impl DataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    pub fn between(mut self, start_date: f64, end_date: f64) -> Self {
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    pub fn last(mut self) -> Self {
        self.last = Some(true);
        self
    }

    pub fn sort(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    pub fn interval(mut self, seconds: u32) -> Self {
        self.interval = Some(seconds);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.push((key.into(), value.to_string()));
        self
    }

    /// Key/value pairs in the order they are sent
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &str, value: String| pairs.push((key.to_string(), value));

        if let Some(page) = self.page {
            push("page", page.to_string());
        }
        if let Some(per_page) = self.per_page {
            push("per_page", per_page.to_string());
        }
        if let Some(start) = self.start_date {
            push("start_date", start.to_string());
        }
        if let Some(end) = self.end_date {
            push("end_date", end.to_string());
        }
        if let Some(date) = self.date {
            push("date", date.to_string());
        }
        if let Some(last) = self.last {
            push("last", flag(last).to_string());
        }
        if let Some(sort) = self.sort {
            push("sort", sort.as_str().to_string());
        }
        if let Some(interval) = self.interval {
            push("interval", interval.to_string());
        }
        if let Some(total) = self.total {
            push("total", flag(total).to_string());
        }
        pairs.extend(self.extra.iter().cloned());
        pairs
    }

    /// Encode the query, followed by one `sensor_id[]` per id
    pub fn encode_with_sensors(&self, sensor_ids: &[&str]) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.extend_pairs(self.to_pairs());
        for id in sensor_ids {
            query.append_pair("sensor_id[]", id);
        }
        query.finish()
    }

    pub fn encode(&self) -> String {
        self.encode_with_sensors(&[])
    }
}
