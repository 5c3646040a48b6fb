//! Dispatcher configuration.

use hopwire_protocol::{ChannelIds, Delivery};

use crate::DispatchError;

/// Settings shared by every envelope a dispatcher sends.
///
/// All peers on a network must use the same channel table.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Transport channel per payload kind.
    pub channels: ChannelIds,

    /// Delivery mode for every envelope. Reliable ordered by default,
    /// which keeps same-channel, same-connection envelopes in send order.
    pub delivery: Delivery,
}

impl DispatchConfig {
    /// Checks that the configuration can be used.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidConfig`] if two payload kinds share
    /// a channel, since inbound envelopes could then not be told apart.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if !self.channels.are_distinct() {
            return Err(DispatchError::InvalidConfig(format!(
                "payload kinds must use distinct channels, got {:?}",
                self.channels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hopwire_protocol::ChannelId;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delivery, Delivery::ReliableOrdered);
        assert_eq!(config.channels.command, ChannelIds::COMMAND);
    }

    #[test]
    fn test_shared_channel_is_rejected() {
        let config = DispatchConfig {
            channels: ChannelIds {
                command: ChannelId(1),
                message: ChannelId(1),
                ..ChannelIds::default()
            },
            ..DispatchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfig(_)));
    }
}
