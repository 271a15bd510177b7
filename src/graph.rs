use crate::calendars::{CalendarDirectory, CalendarInfo};
use crate::error::{FetchError, Result};
use crate::event::{local_midnight, Event, EventType, ResponseStatus};
use crate::provider::{CalendarSource, FetchQuery};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, error, info};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const PAGE_SIZE: &str = "100";
const EVENT_FIELDS: &str = "id,iCalUId,subject,body,start,end,location,isAllDay,showAs,\
responseStatus,onlineMeeting,webLink,isCancelled,categories";

// --- Data Structures for Deserializing API Responses ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCalendar {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_default_calendar: bool,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    pub date_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeeting {
    pub join_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphResponseStatus {
    pub response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    pub id: String,
    #[serde(rename = "iCalUId")]
    pub ical_uid: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub start: DateTimeTimeZone,
    pub end: DateTimeTimeZone,
    // These fields are optional because the API might not return them for all events.
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub is_cancelled: bool,
    pub show_as: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub response_status: Option<GraphResponseStatus>,
    pub online_meeting: Option<OnlineMeeting>,
    pub web_link: Option<String>,
}

/// Graph returns `2024-06-12T09:00:00.0000000` with the zone implied by the
/// `Prefer` header.
fn parse_graph_datetime(raw: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn event_type(raw: &GraphEvent) -> EventType {
    let focus = raw
        .categories
        .iter()
        .map(|c| c.to_lowercase())
        .any(|c| c == "focus time" || c == "focustime");
    if focus {
        return EventType::FocusTime;
    }
    match raw.show_as.as_deref() {
        Some("oof") => EventType::OutOfOffice,
        Some("workingElsewhere") => EventType::WorkingLocation,
        _ => EventType::Default,
    }
}

fn response_status(raw: &GraphEvent) -> ResponseStatus {
    match raw.response_status.as_ref().and_then(|r| r.response.as_deref()) {
        Some("accepted") | Some("organizer") => ResponseStatus::Accepted,
        Some("declined") => ResponseStatus::Rejected,
        Some("tentativelyAccepted") => ResponseStatus::Tentative,
        Some("notResponded") => ResponseStatus::Awaiting,
        _ => ResponseStatus::NoResponseNeeded,
    }
}

/// Converts a Graph record into the unified model. Cancelled and undatable
/// records yield `None`.
pub fn into_event(raw: GraphEvent, source_id: &str, calendar: &CalendarInfo) -> Option<Event> {
    if raw.is_cancelled {
        return None;
    }
    let mut start = parse_graph_datetime(&raw.start.date_time)?;
    let mut end = parse_graph_datetime(&raw.end.date_time)?;
    if raw.is_all_day {
        // All-day spans are dates, not instants: anchor them to local midnight.
        start = local_midnight(start.date_naive()).with_timezone(&Utc);
        end = local_midnight(end.date_naive()).with_timezone(&Utc);
    }

    let kind = event_type(&raw);
    let status = response_status(&raw);
    let mut event = Event::new(
        raw.id,
        calendar.as_calendar(),
        raw.subject.unwrap_or_default(),
        start,
        end,
    );
    event.dedupe_key = raw.ical_uid.unwrap_or_default();
    event.source_id = source_id.to_string();
    event.kind = kind;
    event.status = status;
    event.all_day = raw.is_all_day;
    event.description = raw.body.map(|b| b.content).unwrap_or_default();
    event.location = raw.location.map(|l| l.display_name).unwrap_or_default();
    event.meeting_url = raw
        .online_meeting
        .and_then(|m| m.join_url)
        .filter(|u| !u.is_empty());
    event.url = raw.web_link.filter(|u| !u.is_empty());
    Some(event)
}

fn transport(e: reqwest::Error) -> FetchError {
    FetchError::Transport(e.to_string())
}

/// Microsoft Graph calendars of the signed-in user.
pub struct GraphSource {
    client: reqwest::Client,
    access_token: String,
    directory: CalendarDirectory,
}

impl GraphSource {
    /// Signs in with `access_token` and lists the user's calendars.
    pub async fn connect(access_token: String) -> Result<Self> {
        let mut source = Self {
            client: reqwest::Client::new(),
            access_token,
            directory: CalendarDirectory::default(),
        };
        let url = format!("{}/me/calendars?$select=id,name,isDefaultCalendar", GRAPH_BASE);
        let calendars: Vec<GraphCalendar> = source.get_all(&url, &[]).await?;
        info!("Found {} calendars", calendars.len());
        source.directory = CalendarDirectory::new(
            calendars
                .into_iter()
                .map(|c| CalendarInfo {
                    id: c.id,
                    name: c.name,
                    primary: c.is_default_calendar,
                })
                .collect(),
        );
        Ok(source)
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<Page<T>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header("Prefer", r#"outlook.timezone="UTC""#)
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized(text));
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            error!("Failed to decode JSON: {}. JSON received: {}", e, text);
            FetchError::Decode(e.to_string())
        })
    }

    /// Follows `@odata.nextLink` until the collection is exhausted.
    async fn get_all<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let mut page: Page<T> = self.get_page(url, query).await?;
        let mut items = std::mem::take(&mut page.value);
        while let Some(next) = page.next_link.take() {
            debug!("Following next page link");
            // The link already carries the original query.
            page = self.get_page(&next, &[]).await?;
            items.append(&mut page.value);
        }
        Ok(items)
    }

    fn calendar_view_url(calendar_id: &str) -> Result<Url> {
        let mut url = Url::parse(GRAPH_BASE).map_err(|e| FetchError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Transport("graph base url cannot hold a path".into()))?
            .extend(["me", "calendars", calendar_id, "calendarView"]);
        Ok(url)
    }
}

#[async_trait]
impl CalendarSource for GraphSource {
    fn id(&self) -> &str {
        "outlook"
    }

    fn name(&self) -> &str {
        "Outlook Calendar"
    }

    fn calendars(&self) -> &CalendarDirectory {
        &self.directory
    }

    async fn fetch_calendar(&self, calendar: &CalendarInfo, query: &FetchQuery) -> Result<Vec<Event>> {
        let url = Self::calendar_view_url(&calendar.id)?;
        let params = [
            ("startDateTime", query.start.to_rfc3339()),
            ("endDateTime", query.end.to_rfc3339()),
            ("$select", EVENT_FIELDS.to_string()),
            ("$orderby", "start/dateTime".to_string()),
            ("$top", PAGE_SIZE.to_string()),
        ];
        let raw: Vec<GraphEvent> = self.get_all(url.as_str(), &params).await?;
        debug!("{} returned {} records", calendar.name, raw.len());
        Ok(raw
            .into_iter()
            .filter_map(|r| into_event(r, self.id(), calendar))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate, TimeZone};

    fn parse(json: &str) -> GraphEvent {
        serde_json::from_str(json).unwrap()
    }

    const MEETING: &str = r#"{
        "id": "AAMk1",
        "iCalUId": "040000008200E0",
        "subject": "Design review",
        "body": {"contentType": "html", "content": "<p>Agenda</p>"},
        "start": {"dateTime": "2024-06-12T09:00:00.0000000", "timeZone": "UTC"},
        "end": {"dateTime": "2024-06-12T10:30:00.0000000", "timeZone": "UTC"},
        "location": {"displayName": "Room 4"},
        "isAllDay": false,
        "isCancelled": false,
        "showAs": "busy",
        "categories": [],
        "responseStatus": {"response": "tentativelyAccepted", "time": "0001-01-01T00:00:00Z"},
        "onlineMeeting": {"joinUrl": "https://teams.example.com/join/1"},
        "webLink": "https://outlook.example.com/item/1"
    }"#;

    #[test]
    fn test_maps_graph_event() {
        let calendar = CalendarInfo::new("cal-1", "Calendar");
        let event = into_event(parse(MEETING), "outlook", &calendar).unwrap();
        assert_eq!(event.id, "AAMk1");
        assert_eq!(event.dedupe_key, "040000008200E0");
        assert_eq!(event.title, "Design review");
        assert_eq!(event.calendar.name, "Calendar");
        assert_eq!(event.source_id, "outlook");
        assert_eq!(event.kind, EventType::Default);
        assert_eq!(event.status, ResponseStatus::Tentative);
        assert_eq!(event.start, Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2024, 6, 12, 10, 30, 0).unwrap());
        assert_eq!(event.location, "Room 4");
        assert_eq!(event.meeting_url.as_deref(), Some("https://teams.example.com/join/1"));
        assert_eq!(event.url.as_deref(), Some("https://outlook.example.com/item/1"));
        assert_eq!(event.description, "<p>Agenda</p>");
    }

    #[test]
    fn test_cancelled_events_are_skipped() {
        let raw = MEETING.replace(r#""isCancelled": false"#, r#""isCancelled": true"#);
        assert!(into_event(parse(&raw), "outlook", &CalendarInfo::new("c", "C")).is_none());
    }

    #[test]
    fn test_type_mapping() {
        let oof = parse(&MEETING.replace(r#""showAs": "busy""#, r#""showAs": "oof""#));
        assert_eq!(event_type(&oof), EventType::OutOfOffice);
        let elsewhere = parse(&MEETING.replace(r#""showAs": "busy""#, r#""showAs": "workingElsewhere""#));
        assert_eq!(event_type(&elsewhere), EventType::WorkingLocation);
        let focus = parse(&MEETING.replace(r#""categories": []"#, r#""categories": ["Focus Time"]"#));
        assert_eq!(event_type(&focus), EventType::FocusTime);
    }

    #[test]
    fn test_response_mapping() {
        let with = |r: &str| {
            parse(&MEETING.replace(
                r#""response": "tentativelyAccepted""#,
                &format!(r#""response": "{}""#, r),
            ))
        };
        assert_eq!(response_status(&with("organizer")), ResponseStatus::Accepted);
        assert_eq!(response_status(&with("accepted")), ResponseStatus::Accepted);
        assert_eq!(response_status(&with("declined")), ResponseStatus::Rejected);
        assert_eq!(response_status(&with("notResponded")), ResponseStatus::Awaiting);
        assert_eq!(response_status(&with("none")), ResponseStatus::NoResponseNeeded);
    }

    #[test]
    fn test_all_day_is_anchored_to_local_midnight() {
        let raw = MEETING
            .replace(r#""isAllDay": false"#, r#""isAllDay": true"#)
            .replace("2024-06-12T09:00:00.0000000", "2024-06-12T00:00:00.0000000")
            .replace("2024-06-12T10:30:00.0000000", "2024-06-13T00:00:00.0000000");
        let event = into_event(parse(&raw), "outlook", &CalendarInfo::new("c", "C")).unwrap();
        assert!(event.all_day);
        let day = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        assert_eq!(event.start.with_timezone(&Local).date_naive(), day);
        assert_eq!(event.start, local_midnight(day).with_timezone(&Utc));
    }

    #[test]
    fn test_minimal_record_and_calendar_list() {
        let raw = r#"{
            "id": "x",
            "start": {"dateTime": "2024-06-12T09:00:00", "timeZone": "UTC"},
            "end": {"dateTime": "2024-06-12T09:30:00", "timeZone": "UTC"}
        }"#;
        let event = into_event(parse(raw), "outlook", &CalendarInfo::new("c", "C")).unwrap();
        assert_eq!(event.title, "");
        assert_eq!(event.status, ResponseStatus::NoResponseNeeded);
        assert!(event.meeting_url.is_none());

        let page: Page<GraphCalendar> = serde_json::from_str(
            r#"{"value": [{"id": "a", "name": "Calendar", "isDefaultCalendar": true}],
                "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/calendars?$skip=1"}"#,
        )
        .unwrap();
        assert!(page.value[0].is_default_calendar);
        assert!(page.next_link.is_some());
    }

    #[test]
    fn test_calendar_view_url_escapes_id() {
        let url = GraphSource::calendar_view_url("AAMk/ab==").unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/me/calendars/AAMk%2Fab==/calendarView"
        );
    }
}
