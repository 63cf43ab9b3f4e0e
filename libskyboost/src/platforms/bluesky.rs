//! Bluesky platform implementation
//!
//! Talks AT Protocol XRPC over HTTPS with `reqwest`. Only the handful of
//! endpoints the engine needs are covered: session creation, author and
//! generator feeds, list members, and repost/like record management.
//!
//! Feed responses are decoded entry by entry. An entry that does not match
//! the expected shape is dropped with a debug log instead of failing the
//! whole source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::credentials::AccountCredentials;
use crate::embed::EmbedKind;
use crate::error::{PlatformError, Result};
use crate::platforms::uri::{AtUri, LIKE_COLLECTION, REPOST_COLLECTION};
use crate::platforms::{AuthorFeedFilter, Platform, SessionProvider};
use crate::types::{FeedEntry, PostRef, PostView, RepostMarker, ViewerState};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_PAGE_SIZE: u32 = 100;
/// Upper bound on list pages, in case a server keeps returning cursors
const MAX_LIST_PAGES: usize = 200;
const REASON_PIN: &str = "app.bsky.feed.defs#reasonPin";

/// What kind of request failed, used to pick the fallback error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Login,
    Fetch,
    Mutation,
}

/// Map Bluesky/AT Protocol errors to PlatformError
///
/// Classifies by the HTTP status when there is one and by the XRPC error
/// name carried in the body. Anything unrecognised falls back to `Fetch` or
/// `Mutation` depending on the request kind, keeping the original text so the
/// XRPC error code stays visible in logs.
fn map_bluesky_error(
    status: Option<u16>,
    error_msg: &str,
    context: &str,
    kind: RequestKind,
) -> PlatformError {
    if matches!(status, Some(401) | Some(403))
        || error_msg.contains("AuthenticationRequired")
        || error_msg.contains("InvalidToken")
        || error_msg.contains("ExpiredToken")
        || error_msg.contains("AuthFactorTokenRequired")
    {
        return PlatformError::Authentication(format!(
            "Bluesky authentication failed during {}: {}. Check the account handle and app password.",
            context, error_msg
        ));
    }

    if kind == RequestKind::Login
        && (error_msg.contains("InvalidCredentials") || error_msg.contains("AccountNotFound"))
    {
        return PlatformError::Authentication(format!(
            "Invalid Bluesky credentials: {}. Check the account handle and app password.",
            error_msg
        ));
    }

    if status == Some(429) || error_msg.contains("RateLimitExceeded") {
        return PlatformError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}",
            context, error_msg
        ));
    }

    if status == Some(400)
        || error_msg.contains("InvalidRequest")
        || error_msg.contains("InvalidRecord")
    {
        return PlatformError::Validation(format!(
            "Bluesky rejected the request during {}: {}",
            context, error_msg
        ));
    }

    match kind {
        RequestKind::Login => PlatformError::Authentication(format!(
            "Bluesky login failed: {}",
            error_msg
        )),
        RequestKind::Fetch => PlatformError::Fetch(format!(
            "Bluesky request failed during {}: {}",
            context, error_msg
        )),
        RequestKind::Mutation => PlatformError::Mutation(format!(
            "Bluesky operation failed during {}: {}",
            context, error_msg
        )),
    }
}

/// Map transport-level failures (no HTTP response, or an unreadable body)
fn map_transport_error(error: reqwest::Error, context: &str, kind: RequestKind) -> PlatformError {
    if error.is_timeout() || error.is_connect() {
        return PlatformError::Network(format!(
            "Network error while contacting Bluesky during {}: {}",
            context, error
        ));
    }
    let status = error.status().map(|status| status.as_u16());
    map_bluesky_error(status, &error.to_string(), context, kind)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    feed: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawFeedViewPost {
    post: RawPostView,
    #[serde(default)]
    reason: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPostView {
    uri: String,
    cid: String,
    author: RawProfile,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    embed: Option<Value>,
    #[serde(default)]
    indexed_at: Option<String>,
    #[serde(default)]
    viewer: Option<RawViewer>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    #[serde(default)]
    handle: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawViewer {
    #[serde(default)]
    repost: Option<String>,
    #[serde(default)]
    like: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListItem {
    subject: RawProfile,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<RawFeedViewPost> for FeedEntry {
    fn from(raw: RawFeedViewPost) -> Self {
        let RawFeedViewPost { post, reason } = raw;

        // Pins are the author's own posts; any other reason means a repost
        let repost_marker = match reason {
            None | Some(Value::Null) => None,
            Some(reason) if reason.get("$type").and_then(Value::as_str) == Some(REASON_PIN) => None,
            Some(reason) => Some(RepostMarker {
                by_handle: reason
                    .get("by")
                    .and_then(|by| by.get("handle"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
        };

        let is_reply = matches!(post.record.get("reply"), Some(reply) if !reply.is_null());
        let created_at = parse_timestamp(post.record.get("createdAt").and_then(Value::as_str));
        let viewer = post.viewer.unwrap_or_default();

        FeedEntry {
            post: PostView {
                uri: post.uri,
                cid: post.cid,
                author_handle: post.author.handle,
                indexed_at: parse_timestamp(post.indexed_at.as_deref()),
                created_at,
                embed: EmbedKind::decode(post.embed.as_ref()),
                is_reply,
                viewer: ViewerState {
                    repost: viewer.repost,
                    like: viewer.like,
                },
            },
            repost_marker,
        }
    }
}

/// Decode feed items, dropping any that do not parse
fn decode_feed(items: Vec<Value>) -> Vec<FeedEntry> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawFeedViewPost>(item) {
            Ok(raw) => Some(FeedEntry::from(raw)),
            Err(e) => {
                tracing::debug!("Skipping malformed feed item: {}", e);
                None
            }
        })
        .collect()
}

fn decode_list_members(items: Vec<Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawListItem>(item).ok())
        .map(|item| item.subject.handle)
        .filter(|handle| !handle.is_empty())
        .collect()
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated XRPC session for one account
pub struct BlueskyClient {
    http: reqwest::Client,
    service: String,
    did: String,
    handle: String,
    access_jwt: SecretString,
}

impl BlueskyClient {
    fn http_client() -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("skyboost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)).into())
    }

    fn endpoint(service: &str, nsid: &str) -> String {
        format!("{}/xrpc/{}", service.trim_end_matches('/'), nsid)
    }

    /// Create a session with `com.atproto.server.createSession`
    pub async fn login(service: &str, credentials: &AccountCredentials) -> Result<Self> {
        tracing::debug!("Creating Bluesky session for {}", credentials.identifier);

        let http = Self::http_client()?;
        let request = CreateSessionRequest {
            identifier: &credentials.identifier,
            password: credentials.password.expose_secret(),
        };

        let response = http
            .post(Self::endpoint(service, "com.atproto.server.createSession"))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, "authentication", RequestKind::Login))?;

        let session: SessionResponse =
            Self::read_response(response, "authentication", RequestKind::Login).await?;

        tracing::debug!("Bluesky session created for {} ({})", session.handle, session.did);

        Ok(Self {
            http,
            service: service.to_string(),
            did: session.did,
            handle: session.handle,
            access_jwt: SecretString::from(session.access_jwt),
        })
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
        kind: RequestKind,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{} {}", status.as_u16(), body.trim());
            return Err(map_bluesky_error(Some(status.as_u16()), &message, context, kind).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| map_transport_error(e, context, kind).into())
    }

    /// XRPC query (GET)
    async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(Self::endpoint(&self.service, nsid))
            .bearer_auth(self.access_jwt.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|e| map_transport_error(e, context, RequestKind::Fetch))?;

        Self::read_response(response, context, RequestKind::Fetch).await
    }

    /// XRPC procedure (POST)
    async fn procedure<T: DeserializeOwned>(&self, nsid: &str, body: &Value, context: &str) -> Result<T> {
        let response = self
            .http
            .post(Self::endpoint(&self.service, nsid))
            .bearer_auth(self.access_jwt.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, context, RequestKind::Mutation))?;

        Self::read_response(response, context, RequestKind::Mutation).await
    }

    async fn create_subject_record(&self, collection: &str, post: &PostRef, context: &str) -> Result<String> {
        let body = json!({
            "repo": self.did,
            "collection": collection,
            "record": {
                "$type": collection,
                "subject": { "uri": post.uri, "cid": post.cid },
                "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }
        });

        let created: CreateRecordResponse = self
            .procedure("com.atproto.repo.createRecord", &body, context)
            .await?;
        Ok(created.uri)
    }
}

#[async_trait]
impl Platform for BlueskyClient {
    fn handle(&self) -> &str {
        &self.handle
    }

    async fn fetch_author_feed(
        &self,
        handle: &str,
        limit: u32,
        filter: AuthorFeedFilter,
    ) -> Result<Vec<FeedEntry>> {
        let params = [
            ("actor", handle.to_string()),
            ("limit", limit.to_string()),
            ("filter", filter.as_str().to_string()),
            ("includePins", "false".to_string()),
        ];
        let response: FeedResponse = self
            .query("app.bsky.feed.getAuthorFeed", &params, "getAuthorFeed")
            .await?;
        Ok(decode_feed(response.feed))
    }

    async fn fetch_generator_feed(&self, feed_uri: &str, limit: u32) -> Result<Vec<FeedEntry>> {
        let params = [("feed", feed_uri.to_string()), ("limit", limit.to_string())];
        let response: FeedResponse = self
            .query("app.bsky.feed.getFeed", &params, "getFeed")
            .await?;
        Ok(decode_feed(response.feed))
    }

    async fn fetch_list_members(&self, list_uri: &str) -> Result<Vec<String>> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut params = vec![
                ("list", list_uri.to_string()),
                ("limit", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(cursor) = &cursor {
                params.push(("cursor", cursor.clone()));
            }

            let page: ListResponse = self
                .query("app.bsky.graph.getList", &params, "getList")
                .await?;
            members.extend(decode_list_members(page.items));

            match page.cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(members),
            }
        }

        tracing::warn!(
            "List {} still had more pages after {} requests; using {} members",
            list_uri,
            MAX_LIST_PAGES,
            members.len()
        );
        Ok(members)
    }

    async fn delete_repost(&self, repost_uri: &str) -> Result<()> {
        let record = AtUri::parse(repost_uri)
            .filter(|uri| uri.collection == REPOST_COLLECTION)
            .ok_or_else(|| PlatformError::Mutation(format!("Not a repost record URI: {}", repost_uri)))?;

        let body = json!({
            "repo": self.did,
            "collection": record.collection,
            "rkey": record.rkey,
        });
        let _: Value = self
            .procedure("com.atproto.repo.deleteRecord", &body, "deleteRepost")
            .await?;
        Ok(())
    }

    async fn create_repost(&self, post: &PostRef) -> Result<String> {
        self.create_subject_record(REPOST_COLLECTION, post, "repost").await
    }

    async fn create_like(&self, post: &PostRef) -> Result<String> {
        self.create_subject_record(LIKE_COLLECTION, post, "like").await
    }
}

/// Session provider backed by a Bluesky PDS
#[derive(Debug, Clone)]
pub struct BlueskySessions {
    service: String,
}

impl BlueskySessions {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl Default for BlueskySessions {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

#[async_trait]
impl SessionProvider for BlueskySessions {
    async fn login(&self, credentials: &AccountCredentials) -> Result<Box<dyn Platform>> {
        let client = BlueskyClient::login(&self.service, credentials).await?;
        Ok(Box::new(client))
    }
}
