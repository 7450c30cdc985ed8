use std::{process, sync::Arc};

use tokio::{sync::Notify, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        auth::{AuthPolicy, AuthService},
        error::AppError,
        groups::{CreateGroupCommand, GroupError, GroupService},
        mail::Mailer,
        posts::PostService,
        repos::{
            GroupsRepo, PasswordResetsRepo, PostsRepo, PostsWriteRepo, SessionsRepo, UsersRepo,
        },
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, DatabaseProbe, HttpState, session::SessionCookieSettings},
        mail::FileMailer,
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args).await,
        config::Command::ClearSessions(_) => run_clear_sessions(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let auth = Arc::new(build_auth_service(&repositories, &settings));
    let posts = Arc::new(build_post_service(&repositories, &settings));
    let probe: Arc<dyn DatabaseProbe> = repositories.clone();

    let state = HttpState {
        posts,
        auth: auth.clone(),
        db: probe,
        session_cookie: SessionCookieSettings {
            name: settings.auth.cookie_name.clone(),
            secure: settings.auth.cookie_secure,
        },
    };

    let cleanup_handle = spawn_session_cleanup(auth, settings.auth.cleanup_interval);
    let result = serve_http(&settings, state).await;

    cleanup_handle.abort();
    let _ = cleanup_handle.await;

    result
}

async fn run_groups(settings: config::Settings, args: config::GroupsArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let service = GroupService::new(groups_repo);

    match args.command {
        config::GroupsCommand::Create(create) => {
            let group = service
                .create(CreateGroupCommand {
                    title: create.title,
                    slug: create.slug,
                    description: create.description,
                })
                .await
                .map_err(group_error_to_app)?;
            info!(
                target = "yatube::groups",
                group_id = group.id,
                slug = %group.slug,
                "group created"
            );
            println!("{}\t{}\t{}", group.id, group.slug, group.title);
        }
        config::GroupsCommand::List(list) => {
            let groups = service.list().await.map_err(group_error_to_app)?;
            if list.json {
                let rendered = serde_json::to_string_pretty(&groups)
                    .map_err(|err| AppError::unexpected(err.to_string()))?;
                println!("{rendered}");
            } else {
                for group in groups {
                    println!("{}\t{}\t{}", group.id, group.slug, group.title);
                }
            }
        }
    }
    Ok(())
}

async fn run_clear_sessions(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let auth = build_auth_service(&repositories, &settings);
    let report = auth
        .purge_expired(time::OffsetDateTime::now_utc())
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    info!(
        target = "yatube::clearsessions",
        sessions = report.sessions,
        resets = report.resets,
        "expired sessions removed"
    );
    Ok(())
}

fn group_error_to_app(err: GroupError) -> AppError {
    match err {
        GroupError::Repo(err) => AppError::Repo(err),
        other => AppError::validation(other.to_string()),
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or(InfraError::MissingSetting("database.url"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Database)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::Migration)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_auth_service(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> AuthService {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let resets_repo: Arc<dyn PasswordResetsRepo> = repositories.clone();
    let mailer: Arc<dyn Mailer> = Arc::new(FileMailer::new(
        settings.mail.outbox_dir.clone(),
        settings.mail.from_address.clone(),
    ));

    let policy = AuthPolicy {
        session_ttl: to_time_duration(settings.auth.session_ttl),
        reset_ttl: to_time_duration(settings.auth.password_reset_timeout),
        site_url: settings.auth.site_url.clone(),
    };

    AuthService::new(users_repo, sessions_repo, resets_repo, mailer, policy)
}

fn build_post_service(
    repositories: &Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> PostService {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();

    PostService::new(posts_repo, posts_write_repo, groups_repo, users_repo)
        .with_per_page(settings.posts.per_page.get())
}

fn to_time_duration(value: std::time::Duration) -> time::Duration {
    time::Duration::try_from(value).unwrap_or(time::Duration::MAX)
}

fn spawn_session_cleanup(auth: Arc<AuthService>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            match auth.purge_expired(time::OffsetDateTime::now_utc()).await {
                Ok(report) => info!(
                    target = "yatube::cleanup",
                    sessions = report.sessions,
                    resets = report.resets,
                    "expired sessions purged"
                ),
                Err(err) => warn!(
                    target = "yatube::cleanup",
                    error = %err,
                    "session cleanup failed"
                ),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::Io)?;

    info!(
        target = "yatube::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()));
    let grace = settings.server.graceful_shutdown;

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "yatube::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "yatube::serve", "server stopped");
    Ok(())
}

async fn shutdown_signal(notify: Arc<Notify>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "yatube::serve", "shutdown requested");
    notify.notify_one();
}
