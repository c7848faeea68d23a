//! Generic netlink family resolution through the `nlctrl` controller.

use log::debug;
use std::io;

use crate::api::models::PresenceError;
use crate::netlink::attributes::{decode_attributes, parse_attributes, AttributeEncoder};
use crate::netlink::message::{GenlMessage, HeaderFlags};
use crate::netlink::socket::GenlSocket;
use crate::types::constants::genl;
use crate::Result;

/// A named multicast group advertised by a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MulticastGroup {
    pub(crate) name: String,
    pub(crate) id: u32,
}

/// A resolved generic netlink family.
///
/// Valid only for the socket it was resolved on; resolve again after
/// reconnecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Family {
    pub(crate) name: String,
    pub(crate) id: u16,
    pub(crate) version: u8,
    pub(crate) groups: Vec<MulticastGroup>,
}

impl Family {
    /// Looks up a multicast group by name.
    pub(crate) fn group(&self, name: &str) -> Option<&MulticastGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Parses a `CTRL_CMD_NEWFAMILY` reply payload.
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let attrs = parse_attributes(payload)?;

        let name = attrs.string(genl::CTRL_ATTR_FAMILY_NAME, "family name")?;
        let id = attrs.u16(genl::CTRL_ATTR_FAMILY_ID, "family id")?;
        let version = attrs.u32(genl::CTRL_ATTR_VERSION, "family version")?;
        let version = u8::try_from(version).map_err(|_| {
            PresenceError::ProtocolViolation(format!("family version {version} does not fit u8"))
        })?;

        let mut groups = Vec::new();
        if let Some(nested) = attrs.get(genl::CTRL_ATTR_MCAST_GROUPS) {
            for (_, entry) in decode_attributes(nested)? {
                let group = parse_attributes(entry)?;
                groups.push(MulticastGroup {
                    name: group.string(genl::CTRL_ATTR_MCAST_GRP_NAME, "group name")?,
                    id: group.u32(genl::CTRL_ATTR_MCAST_GRP_ID, "group id")?,
                });
            }
        }

        Ok(Self {
            name,
            id,
            version,
            groups,
        })
    }
}

/// Resolves `name` to its family id, version and multicast groups.
///
/// # Errors
///
/// Returns [`PresenceError::FamilyUnavailable`] when the kernel does not know
/// the family (typically because the module providing it is not loaded).
pub(crate) async fn resolve(socket: &mut GenlSocket, name: &str) -> Result<Family> {
    let request = GenlMessage::new(
        genl::CTRL_CMD_GETFAMILY,
        genl::CTRL_VERSION,
        AttributeEncoder::new()
            .string(genl::CTRL_ATTR_FAMILY_NAME, name)
            .finish(),
    );

    let replies = socket
        .execute(genl::ID_CTRL, HeaderFlags::empty(), &request)
        .await;
    let family = family_from_replies(name, replies)?;
    debug!(
        "Resolved {} as family {} v{} with {} multicast group(s)",
        family.name,
        family.id,
        family.version,
        family.groups.len()
    );
    Ok(family)
}

/// Interprets the controller's answer to a `CTRL_CMD_GETFAMILY` for `name`.
///
/// `ENOENT` from the kernel, or an empty answer, means the family is not
/// registered.
pub(crate) fn family_from_replies(name: &str, replies: Result<Vec<GenlMessage>>) -> Result<Family> {
    let replies = match replies {
        Ok(replies) => replies,
        Err(PresenceError::Kernel { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            debug!("{name:?} family not available");
            return Err(PresenceError::FamilyUnavailable(name.to_string()));
        }
        Err(e) => return Err(e),
    };

    let reply = replies
        .first()
        .ok_or_else(|| PresenceError::FamilyUnavailable(name.to_string()))?;
    Family::parse(&reply.payload)
}
