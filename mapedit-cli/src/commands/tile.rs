//! Tile grid inspection commands.

use clap::Subcommand;
use mapedit::coord::{self, TileAddress};

use crate::error::CliError;

/// Tile inspection subcommands.
#[derive(Debug, Subcommand)]
pub enum TileAction {
    /// Show the tile containing a coordinate
    At {
        /// Zoom level (0-22)
        #[arg(long)]
        zoom: u8,
        /// Longitude in degrees
        #[arg(long)]
        lon: f64,
        /// Latitude in degrees
        #[arg(long)]
        lat: f64,
    },
    /// Decode a quadkey into a tile address
    Quadkey {
        /// Quadkey string (digits 0-3, one per zoom level)
        key: String,
    },
    /// Show the neighbors of a tile
    Neighbors {
        /// Tile as zoom/x/y
        address: String,
    },
}

/// Run a tile subcommand.
pub fn run(action: TileAction) -> Result<(), CliError> {
    match action {
        TileAction::At { zoom, lon, lat } => {
            let address = coord::tile_address(zoom, lon, lat)?;
            print_tile(&address);
            Ok(())
        }
        TileAction::Quadkey { key } => {
            let address = TileAddress::from_quadkey(&key)?;
            print_tile(&address);
            Ok(())
        }
        TileAction::Neighbors { address } => {
            let address = parse_address(&address)?;
            for neighbor in coord::neighbors(&address) {
                println!("{}  quadkey {}", neighbor, neighbor.quadkey());
            }
            Ok(())
        }
    }
}

fn print_tile(address: &TileAddress) {
    let bounds = coord::bounds(address);
    println!("Tile:    {}", address);
    println!("Quadkey: {}", address.quadkey());
    println!(
        "Bounds:  lon [{:.6}, {:.6}]  lat [{:.6}, {:.6}]",
        bounds.min_lon, bounds.max_lon, bounds.min_lat, bounds.max_lat
    );
}

/// Parses `zoom/x/y`.
pub fn parse_address(s: &str) -> Result<TileAddress, CliError> {
    let parts: Vec<&str> = s.split('/').collect();
    let [zoom, x, y] = parts.as_slice() else {
        return Err(CliError::Parse(format!(
            "expected zoom/x/y, got {s:?}"
        )));
    };
    let zoom = zoom
        .parse()
        .map_err(|_| CliError::Parse(format!("bad zoom {zoom:?}")))?;
    let x = x
        .parse()
        .map_err(|_| CliError::Parse(format!("bad x {x:?}")))?;
    let y = y
        .parse()
        .map_err(|_| CliError::Parse(format!("bad y {y:?}")))?;
    Ok(TileAddress::new(x, y, zoom)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let addr = parse_address("4/5/7").unwrap();
        assert_eq!((addr.zoom, addr.x, addr.y), (4, 5, 7));
        assert!(parse_address("4/5").is_err());
        assert!(parse_address("4/5/x").is_err());
        assert!(parse_address("2/9/0").is_err(), "x outside grid");
    }
}
