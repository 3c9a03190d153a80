//! Composition root for the lifecycle engine.
//!
//! Builds one workflow engine, one version ledger and coordinator per
//! entity family, the three domain services and the publish scheduler from
//! a `Config`. Every registry is an owned object; dropping the `Lifecycle`
//! drops them all.

use std::sync::Arc;

use tracing::info;

use crate::adapters::memory::InMemoryEntityRepository;
use crate::domain::errors::DomainResult;
use crate::domain::models::{BlockSnapshot, Config, ContentSnapshot, EntityFamily, PageSnapshot};
use crate::domain::ports::{AuditRecorder, Authorizer, Clock, EntityRepository, SystemClock};
use crate::services::action_registry::ActionRegistry;
use crate::services::audit_log::AuditLogService;
use crate::services::block_service::BlockService;
use crate::services::content_service::ContentService;
use crate::services::guarded_engine::GuardedWorkflowEngine;
use crate::services::page_service::PageService;
use crate::services::publish_coordinator::{PublishCoordinator, ScheduledLifecycle};
use crate::services::publish_scheduler::PublishScheduler;
use crate::services::role_authorizer::RoleAuthorizer;
use crate::services::version_ledger::VersionLedger;
use crate::services::workflow_engine::WorkflowEngine;

pub type LifecycleEngine = GuardedWorkflowEngine<WorkflowEngine>;

/// Wires a `Lifecycle` together. Collaborators left unset get in-memory or
/// default implementations.
pub struct LifecycleBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    actions: Option<ActionRegistry>,
    repository: Option<Arc<dyn EntityRepository>>,
    audit: Option<Arc<dyn AuditRecorder>>,
}

impl LifecycleBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: None,
            authorizer: None,
            actions: None,
            repository: None,
            audit: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to an empty `RoleAuthorizer`, which passes only open guards.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Defaults to the standard `<family>.<transition>` event hooks.
    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn EntityRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Replace the in-memory audit log. `Lifecycle::audit_log` is then `None`.
    pub fn with_audit_recorder(mut self, audit: Arc<dyn AuditRecorder>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> DomainResult<Lifecycle> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let workflows = WorkflowEngine::with_builtin_definitions(clock.clone())?;
        let extra = workflows.load_definitions(config.workflows.clone())?;

        let engine = Arc::new(GuardedWorkflowEngine::new(
            Arc::new(workflows),
            self.authorizer
                .unwrap_or_else(|| Arc::new(RoleAuthorizer::new())),
            Arc::new(
                self.actions
                    .unwrap_or_else(|| ActionRegistry::builder().with_standard_events().build()),
            ),
        ));

        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryEntityRepository::new()));

        let (audit, audit_log): (Arc<dyn AuditRecorder>, _) = match self.audit {
            Some(audit) => (audit, None),
            None => {
                let log = Arc::new(AuditLogService::from_config(&config.audit));
                (log.clone(), Some(log))
            }
        };

        let shared = SharedParts {
            engine: engine.clone(),
            repository,
            audit,
            clock: clock.clone(),
            config: &config,
        };
        let content = shared.coordinator::<ContentSnapshot>(EntityFamily::Content);
        let pages = shared.coordinator::<PageSnapshot>(EntityFamily::Page);
        let blocks = shared.coordinator::<BlockSnapshot>(EntityFamily::Block);

        let scheduler = PublishScheduler::new(
            vec![
                content.clone() as Arc<dyn ScheduledLifecycle>,
                pages.clone() as Arc<dyn ScheduledLifecycle>,
                blocks.clone() as Arc<dyn ScheduledLifecycle>,
            ],
            clock.clone(),
            &config.scheduler,
        );

        info!(
            custom_workflows = extra,
            content_retention = config.retention.content.limit,
            page_retention = config.retention.page.limit,
            block_retention = config.retention.block.limit,
            "Lifecycle engine ready"
        );

        Ok(Lifecycle {
            engine,
            content: ContentService::new(content),
            pages: PageService::new(pages),
            blocks: BlockService::new(blocks),
            scheduler,
            audit_log,
            config,
        })
    }
}

/// Collaborators every family's coordinator shares.
struct SharedParts<'a> {
    engine: Arc<LifecycleEngine>,
    repository: Arc<dyn EntityRepository>,
    audit: Arc<dyn AuditRecorder>,
    clock: Arc<dyn Clock>,
    config: &'a Config,
}

impl SharedParts<'_> {
    fn coordinator<S>(&self, family: EntityFamily) -> Arc<PublishCoordinator<S>>
    where
        S: Clone + Send + Sync + 'static,
    {
        let ledger = VersionLedger::new(
            family,
            self.config.retention.for_family(family),
            self.clock.clone(),
        );
        Arc::new(PublishCoordinator::new(
            self.engine.clone(),
            Arc::new(ledger),
            self.repository.clone(),
            self.audit.clone(),
            self.clock.clone(),
            self.config.publishing.clone(),
        ))
    }
}

/// The assembled lifecycle engine.
pub struct Lifecycle {
    pub engine: Arc<LifecycleEngine>,
    pub content: ContentService,
    pub pages: PageService,
    pub blocks: BlockService,
    pub scheduler: PublishScheduler,
    audit_log: Option<Arc<AuditLogService>>,
    config: Config,
}

impl Lifecycle {
    pub fn builder(config: Config) -> LifecycleBuilder {
        LifecycleBuilder::new(config)
    }

    /// In-memory audit log, unless a custom recorder was supplied.
    pub fn audit_log(&self) -> Option<&Arc<AuditLogService>> {
        self.audit_log.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        RetentionPolicy, TransitionQuery, WorkflowDefinition, WorkflowTransition,
    };
    use crate::domain::ports::ManualClock;
    use crate::services::workflow_engine::TransitionEngine;

    #[test]
    fn test_build_with_defaults() {
        let lifecycle = Lifecycle::builder(Config::default())
            .with_clock(Arc::new(ManualClock::fixed()))
            .build()
            .unwrap();

        assert!(lifecycle.audit_log().is_some());
        let retention = lifecycle.blocks.coordinator().ledger().retention();
        assert_eq!(retention.limit, 20);
        assert_eq!(retention.policy, RetentionPolicy::EvictOldest);
    }

    #[test]
    fn test_config_workflows_override_builtins() {
        let mut config = Config::default();
        config.workflows.push(
            WorkflowDefinition::new("page", "draft")
                .with_states(&["draft", "live"])
                .with_transition(WorkflowTransition::new("publish", "draft", "live")),
        );

        let lifecycle = Lifecycle::builder(config).build().unwrap();
        let names: Vec<_> = lifecycle
            .engine
            .available_transitions(&TransitionQuery::new("page", "draft"))
            .unwrap()
            .into_iter()
            .map(|t| t.to.to_string())
            .collect();
        assert_eq!(names, vec!["live"]);
    }

    #[test]
    fn test_default_authorizer_blocks_guarded_transitions() {
        let lifecycle = Lifecycle::builder(Config::default()).build().unwrap();
        let (entity, _) = lifecycle
            .content
            .create(ContentSnapshot::new("Hi", "hi", ""), "alice")
            .unwrap();
        assert!(lifecycle.content.publish(entity.id, 1, "alice").is_err());
    }
}
