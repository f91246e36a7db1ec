use crate::console::session::{SessionContext, SessionStore};
use crate::console::{
    Alert, Console, Page, add_member, archive_policies, developer_bug, file_attributes,
    file_browser, fs_details, fs_summary, mount_options, navigation::Crumb, recovery_points,
    shared_fs,
};
use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, Query, State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Embedded CSS stylesheet
const STYLESHEET: &str = include_str!("../static/style.css");

const SESSION_COOKIE: &str = "session";

pub struct WebState {
    pub console: Arc<Console>,
    pub sessions: Arc<SessionStore>,
}

struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!("Template error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Extract the session id from the cookie header
fn get_session_from_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            let cookie = cookie.trim();
            cookie
                .strip_prefix("session=")
                .and_then(|s| Uuid::parse_str(s).ok())
        })
}

/// Session of the request, locked for the whole request. The cookie is set
/// when the session was just created.
struct RequestSession {
    ctx: OwnedMutexGuard<SessionContext>,
    new_cookie: Option<HeaderValue>,
}

async fn open_session(state: &WebState, headers: &HeaderMap) -> RequestSession {
    let (session, created): (Arc<Mutex<SessionContext>>, bool) = state
        .sessions
        .get_or_create(get_session_from_cookie(headers))
        .await;
    let mut ctx = session.lock_owned().await;
    ctx.last_seen = Utc::now();

    let new_cookie = if created {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, ctx.id
        ))
        .ok()
    } else {
        None
    };
    RequestSession { ctx, new_cookie }
}

impl RequestSession {
    fn finish(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if let Some(cookie) = self.new_cookie {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }

    /// Render a page. The pending alert is consumed by the render.
    fn render<T: Template>(mut self, page: &Page, build: impl FnOnce(Layout) -> T) -> Response {
        // Opening a page from a breadcrumb trims the trail back to it.
        self.ctx.path.navigate(page.clone(), page);
        let layout = Layout::new(&mut self.ctx, page);
        let template = build(layout);
        self.finish(HtmlTemplate(template))
    }

    /// Redirect after a submit, recording the move in the breadcrumb trail.
    fn redirect(mut self, from: Page, to: Page) -> Response {
        self.ctx.path.navigate(from, &to);
        let url = to.url();
        self.finish(Redirect::to(&url))
    }
}

/// Posted action, or the page itself when the form did not match any
/// action.
fn posted<T>(
    session: &mut RequestSession,
    page: &Page,
    form: Result<Form<T>, FormRejection>,
) -> Option<T> {
    match form {
        Ok(Form(action)) => Some(action),
        Err(rejection) => {
            developer_bug(
                &mut session.ctx,
                &page.title(),
                "form",
                &rejection.body_text(),
            );
            None
        }
    }
}

/// Header, breadcrumbs and alert shared by every page.
struct Layout {
    title: String,
    server: String,
    crumbs: Vec<Crumb>,
    alert: Option<Alert>,
    action_url: String,
}

impl Layout {
    fn new(ctx: &mut SessionContext, page: &Page) -> Self {
        Self {
            title: page.title(),
            server: ctx.server.clone(),
            crumbs: ctx.path.crumbs(),
            alert: ctx.alert.take(),
            action_url: page.url(),
        }
    }
}

/// Serve the embedded CSS stylesheet
async fn serve_css() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLESHEET,
    )
}

pub fn build_web_router(state: Arc<WebState>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/fs") }))
        .route("/static/style.css", get(serve_css))
        .route("/server", post(select_server))
        .route("/session/end", post(end_session))
        .route("/fs", get(fs_summary_page).post(fs_summary_action))
        .route("/fs/{name}", get(fs_details_page).post(fs_details_action))
        .route(
            "/fs/{name}/mount-options",
            get(mount_options_page).post(mount_options_action),
        )
        .route(
            "/fs/{name}/shared",
            get(shared_fs_page).post(shared_fs_action),
        )
        .route(
            "/fs/{name}/shared/add",
            get(add_member_page).post(add_member_action),
        )
        .route(
            "/fs/{name}/policies",
            get(policies_page).post(policies_action),
        )
        .route(
            "/fs/{name}/schedule",
            get(schedule_page).post(schedule_action),
        )
        .route(
            "/fs/{name}/recovery-points",
            get(recovery_points_page).post(recovery_points_action),
        )
        .route("/files", get(file_browser_page).post(file_browser_action))
        .route(
            "/files/details",
            get(file_details_page).post(file_details_action),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ServerForm {
    server: String,
}

async fn select_server(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Form(form): Form<ServerForm>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let server = form.server.trim();
    if !server.is_empty() {
        tracing::info!("Session {} now manages {}", session.ctx.id, server);
        session.ctx.select_server(server);
    }
    session.redirect(Page::FsSummary, Page::FsSummary)
}

/// Drop the session of the browser; the next request starts a fresh one.
async fn end_session(State(state): State<Arc<WebState>>, headers: HeaderMap) -> Response {
    if let Some(id) = get_session_from_cookie(&headers) {
        state.sessions.remove(id).await;
        tracing::info!("Ended session {}", id);
    }
    let expired = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
    ([(header::SET_COOKIE, expired)], Redirect::to("/fs")).into_response()
}

// File system summary

#[derive(Template)]
#[template(path = "fs_summary.html")]
struct FsSummaryTemplate {
    layout: Layout,
    view: fs_summary::SummaryView,
}

async fn fs_summary_page(State(state): State<Arc<WebState>>, headers: HeaderMap) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = fs_summary::display(&state.console, &mut session.ctx).await;
    session.render(&Page::FsSummary, |layout| FsSummaryTemplate { layout, view })
}

async fn fs_summary_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    form: Result<Form<fs_summary::SummaryAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::FsSummary;
    let next = match posted(&mut session, &page, form) {
        Some(action) => fs_summary::submit(&state.console, &mut session.ctx, action).await,
        None => page.clone(),
    };
    session.redirect(page, next)
}

// File system details

#[derive(Template)]
#[template(path = "fs_details.html")]
struct FsDetailsTemplate {
    layout: Layout,
    view: fs_details::FsDetailsView,
}

async fn fs_details_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = fs_details::display(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::FsDetails(name), |layout| FsDetailsTemplate {
        layout,
        view,
    })
}

async fn fs_details_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<fs_details::DetailsAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::FsDetails(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => fs_details::submit(&state.console, &mut session.ctx, &name, action).await,
        None => page.clone(),
    };
    session.redirect(page, next)
}

// Mount options

#[derive(Template)]
#[template(path = "mount_options.html")]
struct MountOptionsTemplate {
    layout: Layout,
    view: mount_options::MountOptionsView,
}

async fn mount_options_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = mount_options::display(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::MountOptions(name), |layout| MountOptionsTemplate {
        layout,
        view,
    })
}

async fn mount_options_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<mount_options::MountOptionsAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::MountOptions(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => {
            mount_options::submit(&state.console, &mut session.ctx, &name, action).await
        }
        None => page.clone(),
    };
    session.redirect(page, next)
}

// Shared file system members

#[derive(Template)]
#[template(path = "shared_fs.html")]
struct SharedFsTemplate {
    layout: Layout,
    view: shared_fs::SharedFsView,
}

async fn shared_fs_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = shared_fs::display(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::SharedFs(name), |layout| SharedFsTemplate {
        layout,
        view,
    })
}

async fn shared_fs_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<shared_fs::SharedFsAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::SharedFs(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => shared_fs::submit(&state.console, &mut session.ctx, &name, action).await,
        None => page.clone(),
    };
    session.redirect(page, next)
}

#[derive(Template)]
#[template(path = "add_member.html")]
struct AddMemberTemplate {
    layout: Layout,
    view: add_member::AddMemberView,
}

async fn add_member_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = add_member::display(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::AddMember(name), |layout| AddMemberTemplate {
        layout,
        view,
    })
}

async fn add_member_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<add_member::AddMemberAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::AddMember(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => add_member::submit(&state.console, &mut session.ctx, &name, action).await,
        None => page.clone(),
    };
    session.redirect(page, next)
}

// Archive policies

#[derive(Template)]
#[template(path = "policies.html")]
struct PoliciesTemplate {
    layout: Layout,
    view: archive_policies::PoliciesView,
}

async fn policies_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = archive_policies::display(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::ArchivePolicies(name), |layout| PoliciesTemplate {
        layout,
        view,
    })
}

async fn policies_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<archive_policies::PolicyAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::ArchivePolicies(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => {
            archive_policies::submit(&state.console, &mut session.ctx, &name, action).await
        }
        None => page.clone(),
    };
    session.redirect(page, next)
}

// Recovery points

#[derive(Template)]
#[template(path = "schedule.html")]
struct ScheduleTemplate {
    layout: Layout,
    view: recovery_points::ScheduleView,
}

async fn schedule_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = recovery_points::display_schedule(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::RecoverySchedule(name), |layout| ScheduleTemplate {
        layout,
        view,
    })
}

async fn schedule_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<recovery_points::ScheduleAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::RecoverySchedule(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => {
            recovery_points::submit_schedule(&state.console, &mut session.ctx, &name, action).await
        }
        None => page.clone(),
    };
    session.redirect(page, next)
}

#[derive(Template)]
#[template(path = "recovery_points.html")]
struct RecoveryPointsTemplate {
    layout: Layout,
    view: recovery_points::RecoveryPointsView,
}

async fn recovery_points_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = recovery_points::display(&state.console, &mut session.ctx, &name).await;
    session.render(&Page::RecoveryPoints(name), |layout| {
        RecoveryPointsTemplate { layout, view }
    })
}

async fn recovery_points_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    form: Result<Form<recovery_points::RecoveryPointAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::RecoveryPoints(name.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => {
            recovery_points::submit(&state.console, &mut session.ctx, &name, action).await
        }
        None => page.clone(),
    };
    session.redirect(page, next)
}

// Files

#[derive(Template)]
#[template(path = "file_browser.html")]
struct FileBrowserTemplate {
    layout: Layout,
    view: file_browser::FileBrowserView,
}

async fn file_browser_page(State(state): State<Arc<WebState>>, headers: HeaderMap) -> Response {
    let mut session = open_session(&state, &headers).await;
    let view = file_browser::display(&state.console, &mut session.ctx).await;
    session.render(&Page::FileBrowser, |layout| FileBrowserTemplate {
        layout,
        view,
    })
}

async fn file_browser_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    form: Result<Form<file_browser::FileBrowserAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let page = Page::FileBrowser;
    let next = match posted(&mut session, &page, form) {
        Some(action) => file_browser::submit(&state.console, &mut session.ctx, action).await,
        None => page.clone(),
    };
    session.redirect(page, next)
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    #[serde(default)]
    path: String,
}

#[derive(Template)]
#[template(path = "file_details.html")]
struct FileDetailsTemplate {
    layout: Layout,
    view: file_attributes::FileDetailsView,
}

async fn file_details_page(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Query(query): Query<PathQuery>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let path = file_browser::remove_trailing_slashes(&query.path);
    let view = file_attributes::display(&state.console, &mut session.ctx, &path).await;
    session.render(&Page::FileDetails(path), |layout| FileDetailsTemplate {
        layout,
        view,
    })
}

async fn file_details_action(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    Query(query): Query<PathQuery>,
    form: Result<Form<file_attributes::FileAttributesAction>, FormRejection>,
) -> Response {
    let mut session = open_session(&state, &headers).await;
    let path = file_browser::remove_trailing_slashes(&query.path);
    let page = Page::FileDetails(path.clone());
    let next = match posted(&mut session, &page, form) {
        Some(action) => {
            file_attributes::submit(&state.console, &mut session.ctx, &path, action).await
        }
        None => page.clone(),
    };
    session.redirect(page, next)
}
