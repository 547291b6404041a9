// This file is part of hmap-gen.
//
// hmap-gen is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// hmap-gen is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with hmap-gen.  If not, see <http://www.gnu.org/licenses/>.
use thiserror::Error;

/// The two ways a TERR operation can fail. Both are raised through `anyhow`;
/// use `downcast_ref::<TerrError>()` to tell them apart.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TerrError {
    /// The bytes do not describe a well formed TERR block.
    #[error("malformed TERR block: {0}")]
    Format(String),

    /// The caller passed selectors or a raster that do not fit the terrain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl TerrError {
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
