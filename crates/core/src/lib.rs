pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod navigation;
pub mod permissions;

pub use approvals::{ApprovalDecision, ApprovalError, ApprovalWorkflow};
pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{
    Actor, Card, CardBrand, CardId, ExpensePolicy, Member, MemberId, PolicyId, Role, Team,
    Transaction, TransactionId, TransactionNote, TransactionStatus,
};
pub use errors::{ActionError, DomainError, ErrorKind, ErrorPayload, LedgerError};
pub use ledger::{Ledger, LedgerSeed, LedgerSnapshot, RecordKind, RecordStore};
pub use navigation::{
    build_redirect, resolve_pending, NavigationBroker, NavigationError, Page, PageOperation,
    Redirect, ResumptionHandler,
};
pub use permissions::{Permission, PermissionTable};
