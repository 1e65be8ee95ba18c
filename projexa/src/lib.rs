// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

pub mod backend;
pub mod config;
pub mod emitter;
pub mod prompt;
pub mod request;
pub mod sanitize;
pub mod server;
