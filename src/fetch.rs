use crate::aggregate::fetch_window;
use crate::app::Message;
use crate::error::Result;
use crate::event::Event;
use crate::filter::{self, OooPeriod};
use crate::provider::{CalendarSource, FetchQuery};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What the state machine asks for: a day, tagged with the generation it was
/// requested under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub generation: u64,
    pub date: NaiveDate,
    pub result: Result<Vec<Event>>,
}

/// Pipeline settings that stay fixed for the whole session.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Template whose window is replaced for every requested day.
    pub query: FetchQuery,
    /// Primary calendar to read out-of-office periods from; `None` disables
    /// the suppression pass.
    pub smart_ooo: Option<String>,
}

/// Out-of-office periods of `primary` over the query window. A primary calendar
/// left out by the calendar filter is fetched on its own; if that fails the
/// suppression pass is skipped.
async fn primary_ooo_periods(
    source: &dyn CalendarSource,
    query: &FetchQuery,
    aggregated: &[Event],
    primary: &str,
) -> Vec<OooPeriod> {
    if query.calendar_ids.is_empty() || query.calendar_ids.contains(primary) {
        return filter::ooo_periods(aggregated, primary);
    }
    let Some(calendar) = source.calendars().get(primary).cloned() else {
        warn!("Primary calendar '{}' is not known to {}", primary, source.name());
        return Vec::new();
    };
    match source.fetch_calendar(&calendar, query).await {
        Ok(events) => filter::ooo_periods(&events, primary),
        Err(e) => {
            warn!("Could not read out-of-office events from '{}': {}", calendar.name, e);
            Vec::new()
        }
    }
}

/// Runs the aggregation pipeline and visibility filters for one query.
pub async fn run_pipeline(
    source: &dyn CalendarSource,
    query: &FetchQuery,
    smart_ooo: Option<&str>,
) -> Result<Vec<Event>> {
    let aggregated = fetch_window(source, query).await?;
    let periods = match smart_ooo {
        Some(primary) => primary_ooo_periods(source, query, &aggregated, primary).await,
        None => Vec::new(),
    };

    let mut visible = filter::apply(aggregated, query);
    if let Some(primary) = smart_ooo {
        if !periods.is_empty() {
            debug!("Suppressing events on {} out-of-office periods", periods.len());
            visible = filter::suppress_ooo_days(visible, &periods, primary);
        }
    }
    Ok(visible)
}

/// Executes fetch requests off the UI task.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn CalendarSource>,
    options: Arc<PipelineOptions>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn CalendarSource>, options: PipelineOptions) -> Self {
        Self {
            source,
            options: Arc::new(options),
        }
    }

    pub async fn run(&self, request: FetchRequest) -> FetchOutcome {
        let query = self.options.query.for_day(request.date);
        let result = run_pipeline(self.source.as_ref(), &query, self.options.smart_ooo.as_deref()).await;
        match &result {
            Ok(events) => info!("Loaded {} events for {}", events.len(), request.date),
            Err(e) => error!("Failed to load events for {}: {}", request.date, e),
        }
        FetchOutcome {
            generation: request.generation,
            date: request.date,
            result,
        }
    }

    /// Fire-and-report: the outcome arrives later as a message.
    pub fn spawn(&self, request: FetchRequest, tx: mpsc::UnboundedSender<Message>) {
        let fetcher = self.clone();
        tokio::spawn(async move {
            let outcome = fetcher.run(request).await;
            if tx.send(Message::FetchCompleted(outcome)).is_err() {
                debug!("UI gone before fetch for {} completed", request.date);
            }
        });
    }
}

/// Opens `url` with the user's default handler. Nothing is reported back.
pub fn spawn_open_url(url: String) {
    tokio::task::spawn_blocking(move || {
        info!("Opening {}", url);
        if let Err(e) = webbrowser::open(&url) {
            error!("Could not open {}: {}", url, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::event::EventType;
    use std::collections::BTreeSet;
    use crate::testing::{local_event, local_on, test_date, StaticSource};

    fn source() -> StaticSource {
        let day = test_date();
        let next = day.succ_opt().unwrap();
        let mut ooo = local_event("me", "Out", local_on(day, 0, 0), local_on(next, 0, 0));
        ooo.kind = EventType::OutOfOffice;
        ooo.all_day = true;
        let mut shared_me = local_event("me", "Sync", local_on(day, 9, 0), local_on(day, 10, 0));
        shared_me.dedupe_key = "sync".into();
        let mut shared_team = local_event("team", "Sync", local_on(day, 9, 0), local_on(day, 10, 0));
        shared_team.dedupe_key = "sync".into();
        StaticSource::new()
            .with_calendar("me", Ok(vec![ooo, shared_me]))
            .with_calendar("team", Ok(vec![shared_team]))
    }

    #[tokio::test]
    async fn test_pipeline_without_smart_ooo() {
        let source = source();
        let query = FetchQuery::new(chrono::Utc::now(), chrono::Utc::now()).for_day(test_date());
        let events = run_pipeline(&source, &query, None).await.unwrap();
        // OOO is not in the default type set; the shared sync is merged.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].calendars.len(), 2);
    }

    #[tokio::test]
    async fn test_pipeline_smart_ooo_uses_hidden_ooo_events() {
        let source = source();
        let query = FetchQuery::new(chrono::Utc::now(), chrono::Utc::now()).for_day(test_date());
        let events = run_pipeline(&source, &query, Some("me")).await.unwrap();
        assert!(events.is_empty());

        let mut with_ooo = query.clone();
        with_ooo.include_types.insert(EventType::OutOfOffice);
        let events = run_pipeline(&source, &with_ooo, Some("me")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Out");
    }

    #[tokio::test]
    async fn test_smart_ooo_reads_primary_outside_calendar_filter() {
        let mut query = FetchQuery::new(chrono::Utc::now(), chrono::Utc::now()).for_day(test_date());
        query.calendar_ids = BTreeSet::from(["team".to_string()]);

        let plain = source();
        let events = run_pipeline(&plain, &query, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(plain.calls(), 1);

        let smart = source();
        let events = run_pipeline(&smart, &query, Some("me")).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(smart.calls(), 2);
    }

    #[tokio::test]
    async fn test_smart_ooo_skipped_when_primary_unreadable() {
        let day = test_date();
        let standup = local_event("team", "Standup", local_on(day, 9, 0), local_on(day, 9, 15));
        let source = StaticSource::new()
            .with_calendar("me", Err(FetchError::Transport("offline".into())))
            .with_calendar("team", Ok(vec![standup]));
        let mut query = FetchQuery::new(chrono::Utc::now(), chrono::Utc::now()).for_day(day);
        query.calendar_ids = BTreeSet::from(["team".to_string()]);
        let events = run_pipeline(&source, &query, Some("me")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Standup");
    }

    #[tokio::test]
    async fn test_fetcher_reports_through_channel() {
        let options = PipelineOptions {
            query: FetchQuery::new(chrono::Utc::now(), chrono::Utc::now()),
            smart_ooo: None,
        };
        let fetcher = Fetcher::new(Arc::new(source()), options);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = FetchRequest {
            generation: 7,
            date: test_date(),
        };
        fetcher.spawn(request, tx);
        match rx.recv().await {
            Some(Message::FetchCompleted(outcome)) => {
                assert_eq!(outcome.generation, 7);
                assert_eq!(outcome.date, test_date());
                assert_eq!(outcome.result.map(|e| e.len()), Ok(1));
            }
            _ => panic!("expected a fetch completion"),
        }
    }
}
