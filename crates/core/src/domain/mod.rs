pub mod card;
pub mod member;
pub mod policy;
pub mod transaction;

pub use card::{Card, CardBrand, CardId};
pub use member::{Actor, Member, MemberId, Role, Team};
pub use policy::{ExpensePolicy, PolicyId};
pub use transaction::{Transaction, TransactionId, TransactionNote, TransactionStatus};
