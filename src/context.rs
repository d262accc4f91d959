/// Application context and dependency wiring
use crate::{
    attendance::AttendanceManager,
    audit::AuditLog,
    auth::SessionManager,
    autoclose::AutoCloseEngine,
    comments::CommentManager,
    config::AppConfig,
    db,
    error::ClubResult,
    members::MemberManager,
    moderation::ModerationPipeline,
    posts::PostManager,
    push::Pusher,
    store::DocStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared services, cloned into every handler and job
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    pub members: Arc<MemberManager>,
    pub sessions: Arc<SessionManager>,
    pub posts: Arc<PostManager>,
    pub attendance: Arc<AttendanceManager>,
    pub comments: Arc<CommentManager>,
    pub moderation: Arc<ModerationPipeline>,
    pub audit: Arc<AuditLog>,
    pub engine: Arc<AutoCloseEngine>,
    pub pusher: Arc<Pusher>,
}

impl AppContext {
    /// Create the context from configuration, opening the database
    pub async fn new(config: AppConfig) -> ClubResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.storage.club_db, db::DatabaseOptions::default()).await?;
        db::init_schema(&pool).await?;
        db::test_connection(&pool).await?;

        let ctx = Self::from_pool(config, pool);

        // Composite indexes provision at startup; until then the engine's
        // indexed plan falls back to the full scan
        ctx.engine_store().provision_indexes().await?;

        Ok(ctx)
    }

    /// Wire managers over an existing pool (tests hand in an in-memory one)
    pub fn from_pool(config: AppConfig, pool: SqlitePool) -> Self {
        let club_id = config.service.club_id.clone();

        let members = Arc::new(MemberManager::new(pool.clone()));
        let sessions = Arc::new(SessionManager::new(pool.clone()));
        let posts_manager = PostManager::new(pool.clone(), club_id.clone());
        let posts = Arc::new(posts_manager.clone());
        let attendance = Arc::new(AttendanceManager::new(pool.clone(), posts_manager));
        let comments = Arc::new(CommentManager::new(pool.clone(), club_id.clone()));
        let moderation = Arc::new(ModerationPipeline::new(pool.clone(), club_id.clone()));
        let audit = Arc::new(AuditLog::new(pool.clone()));
        let store = DocStore::new(pool.clone(), club_id);
        let engine = Arc::new(AutoCloseEngine::new(store, &config.vote));
        let pusher = Arc::new(Pusher::new());

        Self {
            config: Arc::new(config),
            db: pool,
            members,
            sessions,
            posts,
            attendance,
            comments,
            moderation,
            audit,
            engine,
            pusher,
        }
    }

    fn engine_store(&self) -> DocStore {
        DocStore::new(self.db.clone(), self.config.service.club_id.clone())
    }

    /// Provision store indexes (exposed for contexts built via `from_pool`)
    pub async fn provision_indexes(&self) -> ClubResult<()> {
        self.engine_store().provision_indexes().await
    }

    /// The configured club id
    pub fn club_id(&self) -> &str {
        &self.config.service.club_id
    }
}
