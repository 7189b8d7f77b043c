use chrono::{NaiveDate, NaiveDateTime};

use seclog_types::{Channel, DATE_FORMAT, EventRecord, RawRecord};

use crate::FetchError;

/// Which channels to read and which records to keep
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Channels in the order they are read
    channels: Vec<String>,

    /// Inclusive lower bound, from midnight
    start_date: Option<NaiveDate>,

    /// Upper bound, compared against midnight of this day
    end_date: Option<NaiveDate>,

    /// Lower-cased keyword (if any)
    keyword: Option<String>,
}

impl FilterCriteria {
    /// Criteria reading `channels` with no bounds and no keyword
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            start_date: None,
            end_date: None,
            keyword: None,
        }
    }

    /// Every recognized channel, unfiltered (what the monitor polls)
    pub fn all_channels() -> Self {
        Self::new(Channel::ALL.iter().map(|c| c.as_str()))
    }

    /// Build criteria from user input.
    ///
    /// Empty strings leave the corresponding bound or keyword unset.
    pub fn parse<I, S>(channels: I, start: &str, end: &str, keyword: &str) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start_date = parse_date(start)?;
        let end_date = parse_date(end)?;
        Ok(Self::new(channels)
            .with_start_date(start_date)
            .with_end_date(end_date)
            .with_keyword(keyword))
    }

    pub fn with_start_date(mut self, date: Option<NaiveDate>) -> Self {
        self.start_date = date;
        self
    }

    pub fn with_end_date(mut self, date: Option<NaiveDate>) -> Self {
        self.end_date = date;
        self
    }

    /// Set the keyword; an empty keyword matches everything
    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keyword = (!keyword.is_empty()).then(|| keyword.to_lowercase());
        self
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// Normalize a raw record and keep it only if it passes every predicate
    pub fn apply(&self, raw: &RawRecord) -> Option<EventRecord> {
        let record = EventRecord::from_raw(raw);
        self.matches(&record).then_some(record)
    }

    /// Check a normalized record against the date bounds and keyword
    pub fn matches(&self, record: &EventRecord) -> bool {
        let ts = record.timestamp();

        if let Some(start) = self.start_date
            && ts < midnight(start)
        {
            return false;
        }

        // Only midnight of the end day itself passes
        if let Some(end) = self.end_date
            && ts > midnight(end)
        {
            return false;
        }

        match &self.keyword {
            Some(keyword) => record.searchable_text().to_lowercase().contains(keyword),
            None => true,
        }
    }

    /// Check if criteria keep every record
    pub fn is_unfiltered(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.keyword.is_none()
    }
}

/// Parse a `YYYY-MM-DD` date; an empty string means no bound
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>, FetchError> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| FetchError::InvalidDateFormat {
            value: value.to_string(),
        })
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}
