//! Standard event names that cross the core boundary (spec §4.5 table).
//! The core never prescribes handler semantics for these — it only
//! guarantees the delivery contract implemented in [`super::bus`].

pub const RESOURCE_CREATED: &str = "resource.created";
pub const RESOURCE_UPDATED: &str = "resource.updated";
pub const RESOURCE_DELETED: &str = "resource.deleted";
pub const QUALITY_COMPUTED: &str = "quality.computed";
pub const QUALITY_OUTLIER_DETECTED: &str = "quality.outlier_detected";
pub const QUALITY_DEGRADATION_DETECTED: &str = "quality.degradation_detected";
pub const CITATION_EXTRACTED: &str = "citation.extracted";
pub const CURATION_REVIEWED: &str = "curation.reviewed";
pub const CURATION_APPROVED: &str = "curation.approved";
pub const CURATION_REJECTED: &str = "curation.rejected";
