// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred completion results
//!
//! Plugin setup functions and collaborator `init()` calls may finish
//! immediately or later. [`Deferred`] carries either outcome so callers can
//! tell the two apart (the boot barrier settles synchronous results on the
//! spot) while still being able to `.await` either one.
//!
//! Everything runs on the driver's single thread, so pending futures are
//! `!Send` ([`LocalBoxFuture`]).

use std::future::{Future, IntoFuture};

use futures::future::{self, FutureExt, LocalBoxFuture};

use super::error::Result;

/// Outcome of an operation that may complete later
pub enum Deferred {
    /// Already settled
    Ready(Result<()>),
    /// Settles when the future resolves
    Pending(LocalBoxFuture<'static, Result<()>>),
}

impl Deferred {
    /// A successfully completed result
    ///
    /// # Example
    ///
    /// ```
    /// use pcsys::core::deferred::Deferred;
    /// use std::future::IntoFuture;
    ///
    /// let done = Deferred::done();
    /// assert!(!done.is_pending());
    /// assert!(pollster::block_on(done.into_future()).is_ok());
    /// ```
    pub fn done() -> Self {
        Self::Ready(Ok(()))
    }

    /// Wrap a future that settles later
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<()>> + 'static,
    {
        Self::Pending(future.boxed_local())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl From<Result<()>> for Deferred {
    fn from(result: Result<()>) -> Self {
        Self::Ready(result)
    }
}

impl IntoFuture for Deferred {
    type Output = Result<()>;
    type IntoFuture = LocalBoxFuture<'static, Result<()>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(result) => future::ready(result).boxed_local(),
            Self::Pending(future) => future,
        }
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
