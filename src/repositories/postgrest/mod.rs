use core::marker::PhantomData;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::Instrument;

use self::converters::{classify, convert_repo_err, first_or_404, parse_content_range};
use self::models::{
    CommentInsert, CommentRow, ConfessionInsert, ConfessionPatch, ConfessionRow, ProfileInsert,
    ProfilePatch, ProfileRow, ReportInsert, ReportRow,
};
use super::{
    CommentRepository, ConfessionMutation, ConfessionQuery, ConfessionRepository, NewComment,
    NewConfession, NewProfile, NewReport, ProfileMutation, ProfileQuery, ProfileRepository,
    ReportQuery, ReportRepository, RepositoryError, Result,
};
use crate::entities::{
    Comment, Confession, ConfessionId, Profile, ProfileId, Report, ReportId, Table,
};

mod converters;
mod models;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

type Params = Vec<(&'static str, String)>;

/// thin PostgREST client shared by every table repository.
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
}

impl PostgrestClient {
    /// `api_url` is the project url, e.g. `https://xyz.supabase.co`.
    pub fn new(api_url: impl AsRef<str>, anon_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_url: format!("{}/rest/v1", api_url.as_ref().trim_end_matches('/')),
            anon_key: anon_key.into(),
        }
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table.name()))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let err = classify(status.as_u16(), &body);

        match err {
            RepositoryError::NotFound => tracing::trace!("no rows - {}", status),
            ref e => tracing::warn!("postgrest request failed: {}", e),
        }

        Err(err)
    }

    async fn send(req: RequestBuilder) -> Result<Response> {
        let resp = convert_repo_err(req.send().instrument(tracing::trace_span!("send")).await)?;

        Self::check(resp).await
    }

    async fn select<T: DeserializeOwned>(&self, table: Table, params: Params) -> Result<Vec<T>> {
        let req = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .query(&params);

        convert_repo_err(Self::send(req).await?.json().await)
    }

    async fn select_single<T: DeserializeOwned>(&self, table: Table, params: Params) -> Result<T> {
        let req = self
            .request(Method::GET, table)
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
            .query(&[("select", "*")])
            .query(&params);

        convert_repo_err(Self::send(req).await?.json().await)
    }

    async fn count(&self, table: Table) -> Result<u64> {
        let req = self
            .request(Method::HEAD, table)
            .header("Prefer", "count=exact")
            .query(&[("select", "*")]);
        let resp = Self::send(req).await?;

        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| {
                RepositoryError::Internal(anyhow::anyhow!("missing Content-Range on count"))
            })
    }

    async fn insert<B, T>(&self, table: Table, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let req = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body);
        let rows: Vec<T> = convert_repo_err(Self::send(req).await?.json().await)?;

        first_or_404(rows)
    }

    async fn update<B, T>(&self, table: Table, params: Params, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let req = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(body);
        let rows: Vec<T> = convert_repo_err(Self::send(req).await?.json().await)?;

        first_or_404(rows)
    }

    async fn delete(&self, table: Table, params: Params) -> Result<()> {
        let req = self
            .request(Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(&params);
        let rows: Vec<::serde_json::Value> =
            convert_repo_err(Self::send(req).await?.json().await)?;

        match rows.len() {
            0 => Err(RepositoryError::NotFound),
            _ => Ok(()),
        }
    }
}

impl ::core::fmt::Debug for PostgrestClient {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        f.debug_struct("PostgrestClient")
            .field("rest_url", &self.rest_url)
            .finish_non_exhaustive()
    }
}

fn eq(v: impl ::core::fmt::Display) -> String { format!("eq.{}", v) }

fn order_desc(column: &str) -> String { format!("{}.desc", column) }

fn limit(params: &mut Params, limit: Option<usize>) {
    if let Some(n) = limit {
        params.push(("limit", n.to_string()));
    }
}

/// table repository over [`PostgrestClient`].
pub struct PostgrestRepository<T> {
    client: PostgrestClient,
    _row: PhantomData<fn() -> T>,
}

impl<T> PostgrestRepository<T> {
    pub fn new_with(client: PostgrestClient) -> Self {
        Self {
            client,
            _row: PhantomData,
        }
    }
}

#[async_trait]
impl ProfileRepository for PostgrestRepository<Profile> {
    async fn insert(&self, item: NewProfile) -> Result<Profile> {
        let row: ProfileRow = self
            .client
            .insert(Table::Profiles, &ProfileInsert::from(item))
            .await?;

        Ok(row.into())
    }

    async fn find(&self, id: ProfileId) -> Result<Profile> {
        let row: ProfileRow = self
            .client
            .select_single(Table::Profiles, vec![("id", eq(id))])
            .await?;

        Ok(row.into())
    }

    async fn find_by_uid(&self, firebase_uid: &str) -> Result<Profile> {
        let row: ProfileRow = self
            .client
            .select_single(Table::Profiles, vec![("firebase_uid", eq(firebase_uid))])
            .await?;

        Ok(row.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Profile> {
        let row: ProfileRow = self
            .client
            .select_single(Table::Profiles, vec![("username", eq(username))])
            .await?;

        Ok(row.into())
    }

    async fn finds(&self, query: ProfileQuery) -> Result<Vec<Profile>> {
        let mut params = vec![("order", order_desc("created_at"))];
        limit(&mut params, query.limit);

        let rows: Vec<ProfileRow> = self.client.select(Table::Profiles, params).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> Result<u64> { self.client.count(Table::Profiles).await }

    async fn update(&self, id: ProfileId, mutation: ProfileMutation) -> Result<Profile> {
        let row: ProfileRow = self
            .client
            .update(
                Table::Profiles,
                vec![("id", eq(id))],
                &ProfilePatch::from(mutation),
            )
            .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl ConfessionRepository for PostgrestRepository<Confession> {
    async fn insert(&self, item: NewConfession) -> Result<Confession> {
        let row: ConfessionRow = self
            .client
            .insert(Table::Confessions, &ConfessionInsert::from(item))
            .await?;

        Ok(row.into())
    }

    async fn find(&self, id: ConfessionId) -> Result<Confession> {
        let row: ConfessionRow = self
            .client
            .select_single(Table::Confessions, vec![("id", eq(id))])
            .await?;

        Ok(row.into())
    }

    async fn finds(&self, query: ConfessionQuery) -> Result<Vec<Confession>> {
        let ConfessionQuery {
            flagged,
            order,
            limit: lim,
        } = query;

        let mut params = vec![];
        if let Some(f) = flagged {
            params.push(("is_flagged", eq(f)));
        }
        params.push(("order", order_desc(order.column())));
        limit(&mut params, lim);

        let rows: Vec<ConfessionRow> = self.client.select(Table::Confessions, params).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn finds_by_ids(&self, ids: &[ConfessionId]) -> Result<Vec<Confession>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let rows: Vec<ConfessionRow> = self
            .client
            .select(Table::Confessions, vec![("id", format!("in.({})", list))])
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> Result<u64> { self.client.count(Table::Confessions).await }

    async fn update(&self, id: ConfessionId, mutation: ConfessionMutation) -> Result<Confession> {
        let row: ConfessionRow = self
            .client
            .update(
                Table::Confessions,
                vec![("id", eq(id))],
                &ConfessionPatch::from(mutation),
            )
            .await?;

        Ok(row.into())
    }

    async fn delete(&self, id: ConfessionId) -> Result<()> {
        self.client
            .delete(Table::Confessions, vec![("id", eq(id))])
            .await
    }
}

#[async_trait]
impl CommentRepository for PostgrestRepository<Comment> {
    async fn insert(&self, item: NewComment) -> Result<Comment> {
        let row: CommentRow = self
            .client
            .insert(Table::Comments, &CommentInsert::from(item))
            .await?;

        Ok(row.into())
    }

    async fn finds(&self, confession_id: ConfessionId) -> Result<Vec<Comment>> {
        let rows: Vec<CommentRow> = self
            .client
            .select(Table::Comments, vec![
                ("confession_id", eq(confession_id)),
                ("order", "created_at.asc".to_string()),
            ])
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ReportRepository for PostgrestRepository<Report> {
    async fn insert(&self, item: NewReport) -> Result<Report> {
        let row: ReportRow = self
            .client
            .insert(Table::Reports, &ReportInsert::from(item))
            .await?;

        Ok(row.into())
    }

    async fn finds(&self, query: ReportQuery) -> Result<Vec<Report>> {
        let mut params = vec![("order", order_desc("created_at"))];
        limit(&mut params, query.limit);

        let rows: Vec<ReportRow> = self.client.select(Table::Reports, params).await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> Result<u64> { self.client.count(Table::Reports).await }

    async fn delete(&self, id: ReportId) -> Result<()> {
        self.client
            .delete(Table::Reports, vec![("id", eq(id))])
            .await
    }
}
