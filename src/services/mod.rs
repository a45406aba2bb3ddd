pub mod assistant;
pub mod dialogue;
pub mod middleware;
pub mod moderation;
pub mod payment;
pub mod task;
pub mod user;

use assistant::AssistantService;
use moderation::ModerationService;
use payment::{PaymentService, YookassaClient};
use task::PipelineGuard;
use user::UserService;

use crate::config::AppConfig;
use crate::storage::TursoClient;

#[derive(Clone)]
pub struct ServiceRegistry {
    pub user: UserService,
    pub payment: PaymentService,
    pub yookassa: YookassaClient,
    pub assistant: AssistantService,
    pub moderation: ModerationService,
    pub guard: PipelineGuard,
}

impl ServiceRegistry {
    pub fn new(config: &AppConfig, turso: TursoClient) -> Self {
        info!("Initializing service registry");

        let registry = Self {
            user: UserService::new(turso.clone(), config.quota.clone()),
            payment: PaymentService::new(turso, config.packages.clone()),
            yookassa: YookassaClient::new(config.yookassa.clone()),
            assistant: AssistantService::new(config.assistant.clone(), config.pricing.clone()),
            moderation: ModerationService::new(),
            guard: PipelineGuard::new(),
        };

        info!("Service registry initialized");

        registry
    }
}
