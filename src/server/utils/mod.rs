pub mod encoding_utils;
pub mod playlist_utils;
