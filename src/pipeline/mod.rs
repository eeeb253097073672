//! 流水线处理模块：回合投递与装配的核心阶段。
//!
//! # Delivery Pipeline
//!
//! The stages a send moves through, in order:
//!
//! ```text
//! Turn Builder → Endpoint Resolver → Retry Loop → {Stream Reader | buffered read}
//!                                                        │
//!                                                 Response Normalizer
//!                                                        │
//!                                                  session update
//! ```
//!
//! The Failure Reporter intercepts at any point inside the retry loop.
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`turn`] | Builds the outgoing user message, optimistic session update |
//! | [`reader`] | Consumes chunked transport, emits tokens/envelope/errors |
//! | [`normalize`] | Extracts content and reasoning fields from any reply shape |
//! | [`retry`] | Attempt bookkeeping and escalation notice timers |
//! | [`report`] | Maps terminal errors to categories and conversational fallback |

pub mod normalize;
pub mod reader;
pub mod report;
pub mod retry;
pub mod turn;
