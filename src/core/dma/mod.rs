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

//! DMA controller contract
//!
//! The 8237A DMA controller takes the bus with a hold handshake:
//!
//! ```text
//! DMA ──HRQ high──▶ system   (raise_hrq)
//! CPU finishes its bus cycle, samples HRQ
//! CPU ──HLDA──────▶ DMA      (raise_hlda)
//! DMA transfers, then drops HRQ (lower_hrq)
//! ```
//!
//! The HRQ line lives in the system; the controller only needs to be told
//! when hold is acknowledged.

/// The system's view of the DMA controller
pub trait DmaController {
    /// Hold acknowledge: the CPU has released the bus
    fn raise_hlda(&self);
}
