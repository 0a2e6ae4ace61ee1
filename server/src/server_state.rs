use carpool_data_management::{football_data::FootballDataClient, DataManager};

use crate::{auth::TokenKeys, chat_rooms::ChatRooms, config::Config};

pub struct ServerState {
    pub data_manager: DataManager,
    pub football: FootballDataClient,
    pub tokens: TokenKeys,
    pub chat_rooms: ChatRooms,
    pub bcrypt_cost: u32,
}

impl ServerState {
    pub fn new(config: &Config, data_manager: DataManager) -> anyhow::Result<Self> {
        Ok(Self {
            data_manager,
            football: FootballDataClient::new(config.football.clone())?,
            tokens: TokenKeys::new(&config.jwt_secret, config.token_ttl),
            chat_rooms: ChatRooms::new(config.chat_room_capacity),
            bcrypt_cost: config.bcrypt_cost,
        })
    }
}
