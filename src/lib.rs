//! Pipeline Contracts
//!
//! Immutable, versioned wire contracts exchanged between the phases of a
//! build/validation pipeline, plus the rules for evolving them without
//! breaking readers.
//!
//! ## Features
//!
//! - **Sealed Instances**: Contracts are validated once and then frozen
//! - **Extra-Field Policies**: `forbid` contracts reject unknown keys, `allow`
//!   contracts keep them in an extra bag and write them back out
//! - **Major-Line Compatibility**: `1.x` readers accept any `1.y` payload
//! - **Deterministic Encoding**: Sorted-key JSON suitable for hashing and diffing
//! - **Stable Identifiers**: Append-only `RRH-xxxx`, `CHECK-MEAS-xxx` and
//!   `CHECK-xxxx` tables
//!
//! ## Layout
//!
//! ```text
//! contracts/
//! ├── checks       CheckResult, Verdict, RRHResult
//! ├── run          RunContext, Checkpoint
//! ├── hooks        HookInvocation, HookInvocationResult
//! ├── node         NodeOperationRequest, NodeOperationResult
//! ├── auth         WorkAuthorization
//! ├── validation   ValidationPlan, ValidationRun, ValidationResult, ValidationVerdict
//! ├── delegation   DelegationRequest/Decision, EnrichmentRequest/Result
//! └── events       GitHookEvent, LinearSnapshotEvent, GitHubPRStatusEvent, EventEnvelope
//! ```
//!
//! ## Example
//!
//! ```
//! use pipeline_contracts::contracts::checks::{Verdict, VerdictStatus};
//! use pipeline_contracts::{decode_json, encode_json, Contract, Sealed};
//!
//! let verdict = Verdict::new(VerdictStatus::Fail)
//!     .with_score(40)
//!     .with_block_reason("Tests failed")
//!     .seal()?;
//! let text = encode_json(&*verdict)?;
//! let back: Sealed<Verdict> = decode_json(&text)?;
//! assert_eq!(back, verdict);
//! # Ok::<(), pipeline_contracts::ContractError>(())
//! ```

pub mod checksum;
pub mod codec;
pub mod config;
pub mod contracts;
pub mod error;
pub mod export;
pub mod ids;
pub mod registry;
pub mod schema;
pub mod version;

pub use checksum::Checksum;
pub use codec::{
    decode, decode_json, decode_yaml, diff_canonical, encode, encode_json, encode_json_pretty,
    encode_yaml, DecodeMode, Decoder, WireFormat,
};
pub use config::ContractsConfig;
pub use error::{ContractError, Result};
pub use ids::StableId;
pub use schema::{Contract, ExtraBag, ExtraFields, ExtraPolicy, Sealed};
pub use version::{is_compatible, SchemaVersion, DEFAULT_SCHEMA_VERSION};
