//! Authority control (subject/creator/publisher normalization) and
//! rule-based classification (spec §4.6). Grounded in
//! `original_source/backend/app/modules/authority/service.py`.

pub mod classify;
pub mod normalize;

pub use classify::{auto_classify, suggest_reclassification, TopLevelCode};
pub use normalize::AuthorityStore;
