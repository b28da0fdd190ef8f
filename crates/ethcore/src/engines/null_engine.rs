// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Ferron.

// Ferron is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Ferron is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Ferron.  If not, see <http://www.gnu.org/licenses/>.

//! A blockchain engine that does not require any consensus.

use engines::Engine;
use machine::Machine;
use types::BlockNumber;

/// An engine which does not provide any consensus mechanism and does not seal blocks.
pub struct NullEngine {
    machine: Machine,
}

impl NullEngine {
    /// Create a new instance around the given machine.
    pub fn new(machine: Machine) -> Self {
        NullEngine { machine }
    }
}

impl Engine for NullEngine {
    fn name(&self) -> &str {
        "NullEngine"
    }

    fn machine(&self) -> &Machine {
        &self.machine
    }

    fn maximum_uncle_count(&self, _block: BlockNumber) -> usize {
        2
    }
}
