//! Game-specific telemetry adapters for Trackside

pub mod assetto_corsa;
pub mod automobilista2;
pub mod demo;
pub mod iracing;
pub mod raceroom;
pub mod scs;
pub mod source;

pub use assetto_corsa::AssettoCorsaAdapter;
pub use automobilista2::Automobilista2Adapter;
pub use demo::DemoAdapter;
pub use iracing::IRacingAdapter;
pub use raceroom::RaceRoomAdapter;
pub use scs::ScsAdapter;

use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::Game;

/// Construct the adapter for a simulator.
///
/// `None` for games served outside the common adapter path (ACC keeps its
/// dedicated pipeline).
pub fn create_adapter(game: Game) -> Option<Box<dyn SimulatorAdapter>> {
    match game {
        Game::AssettoCorsa1 => Some(Box::new(AssettoCorsaAdapter::new())),
        Game::AssettoCorsaCompetizione => None,
        Game::IRacing => Some(Box::new(IRacingAdapter::new())),
        Game::RaceRoom => Some(Box::new(RaceRoomAdapter::new())),
        Game::Automobilista2 => Some(Box::new(Automobilista2Adapter::new())),
        Game::EuroTruckSimulator2 | Game::AmericanTruckSimulator => {
            Some(Box::new(ScsAdapter::new(game)))
        }
        Game::Demo => Some(Box::new(DemoAdapter::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_every_common_path_game() {
        for game in [
            Game::AssettoCorsa1,
            Game::IRacing,
            Game::RaceRoom,
            Game::Automobilista2,
            Game::EuroTruckSimulator2,
            Game::AmericanTruckSimulator,
            Game::Demo,
        ] {
            let adapter = create_adapter(game).expect("adapter");
            assert_eq!(adapter.game(), game);
        }
    }

    #[test]
    fn test_acc_uses_its_own_pipeline() {
        assert!(create_adapter(Game::AssettoCorsaCompetizione).is_none());
    }
}
