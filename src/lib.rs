//! # Research Harness
//!
//! A data-collection pipeline for market research. Given a research subject
//! (industry, region, product description) it searches the web, scrapes
//! competitor pages, collects news articles, queries statistics APIs, and
//! verifies what it stored. The collected corpus can then be rendered as a
//! size-bounded Markdown digest for a language model or summarized as
//! counts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Providers   │──▶│  WebSearch   │──▶│           │
//! │ DDG/SerpAPI  │   │   Service    │   │           │
//! └──────────────┘   └──────────────┘   │ Pipeline  │──▶ SQLite
//! ┌──────────────┐   ┌──────────────┐   │  stages   │   (Store)
//! │ Fetch / News │   │ Statistics   │──▶│           │
//! │   Parser     │──▶│  Verifier    │   │           │
//! └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                             │
//!                              ┌──────────────┴──────┐
//!                              ▼                     ▼
//!                        ┌──────────┐          ┌──────────┐
//!                        │  Digest  │          │ Summary  │
//!                        └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rh init                                          # create database
//! rh search "CRM системы" --limit 5                # ad-hoc web search
//! rh collect --industry "IT" --region "Moscow"     # full collection run
//! rh digest <research-id>                          # Markdown digest
//! rh summary <research-id>                         # counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Provider and collection error types |
//! | [`traits`] | Collaborator traits (search provider, fetcher, news parser, statistics API, verifier) |
//! | [`http`] | Shared HTTP client construction |
//! | [`rate_limit`] | Minimum spacing between provider calls |
//! | [`provider_duckduckgo`] | Free primary search provider |
//! | [`provider_serpapi`] | Paid secondary search provider |
//! | [`web_search`] | Fallback search, categorized search, result normalization |
//! | [`extract`] | HTML text and article extraction |
//! | [`fetch`] | HTTP page fetcher and news parser |
//! | [`statistics`] | Statistics API catalogue |
//! | [`verify`] | Record verification |
//! | [`registry`] | Atomic resolve-or-create of data sources |
//! | [`pipeline`] | Stage orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite-backed store |
//! | [`collect`], [`report`], [`sources`] | CLI command implementations |

pub mod collect;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod http;
pub mod migrate;
pub mod pipeline;
pub mod provider_duckduckgo;
pub mod provider_serpapi;
pub mod rate_limit;
pub mod registry;
pub mod report;
pub mod sources;
pub mod sqlite_store;
pub mod statistics;
pub mod traits;
pub mod verify;
pub mod web_search;
