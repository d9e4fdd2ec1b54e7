//! # casegen
//!
//! A retrieval-augmented test case generation service.
//!
//! casegen ingests an uploaded requirement document, chunks and embeds it
//! into a remote vector index, and grounds a generative model's output in
//! the retrieved context to produce structured, validated test cases.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload  │──▶│   Pipeline    │──▶│  Qdrant   │
//! │ PDF/DOCX │   │ Chunk+Embed  │   │ (1 doc)   │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │ top-k
//!                                        ▼
//!                  ┌──────────┐    ┌───────────┐
//!                  │   CLI /  │◀───│ Retrieval  │
//!                  │   HTTP   │    │ +Generate │
//!                  └──────────┘    └───────────┘
//! ```
//!
//! The index holds one logical document at a time: each upload purges the
//! collection before the new chunks land.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | Document text extraction (PDF, DOCX, text) |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider client |
//! | [`index`] | Qdrant vector-index client |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieval`] | Top-k similarity retrieval |
//! | [`generate`] | Grounded structured generation |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod server;
