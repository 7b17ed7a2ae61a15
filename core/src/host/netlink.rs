//! rtnetlink backed [`HostNetworking`].

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroI32;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use pnet::ipnetwork::Ipv4Network;
use rtnetlink::packet_core::{NetlinkMessage, NetlinkPayload};
use rtnetlink::packet_route::address::{AddressAttribute, AddressMessage};
use rtnetlink::packet_route::link::{LinkAttribute, LinkMessage};
use rtnetlink::packet_route::route::RouteScope;
use rtnetlink::packet_route::{AddressFamily, RouteNetlinkMessage};
use rtnetlink::sys::{AsyncSocket, SocketAddr};
use rtnetlink::{Handle, LinkUnspec, RouteMessageBuilder, constants::RTMGRP_LINK, new_connection};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use scaleout_common::host::{HostError, HostNetworking, LinkSubscription, Route};
use scaleout_common::network::{AdminState, Link, LinkEvent, mac};

pub struct NetlinkHost {
    handle: Handle,
}

impl NetlinkHost {
    /// Opens a route netlink socket. Must be called inside a tokio runtime.
    pub fn new() -> Result<Self, HostError> {
        let (connection, handle, _) = new_connection()?;
        tokio::spawn(connection);
        Ok(Self { handle })
    }

    async fn address_messages(&self, index: u32) -> Result<Vec<AddressMessage>, HostError> {
        self.handle
            .address()
            .get()
            .set_link_index_filter(index)
            .execute()
            .try_collect::<Vec<AddressMessage>>()
            .await
            .map_err(classify)
    }

    async fn set_link(&self, message: LinkMessage) -> Result<(), HostError> {
        self.handle
            .link()
            .set(message)
            .execute()
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl HostNetworking for NetlinkHost {
    async fn link_by_name(&self, name: &str) -> Result<Link, HostError> {
        let mut links = self
            .handle
            .link()
            .get()
            .match_name(name.to_string())
            .execute();

        match links.try_next().await {
            Ok(Some(message)) => Ok(link_from_message(message)),
            Ok(None) => Err(HostError::NotFound(name.to_string())),
            Err(e) if errno(&e) == Some(libc::ENODEV) => Err(HostError::NotFound(name.to_string())),
            Err(e) => Err(classify(e)),
        }
    }

    async fn addr_list(&self, link: &Link) -> Result<Vec<Ipv4Network>, HostError> {
        let messages: Vec<AddressMessage> = self.address_messages(link.index).await?;
        Ok(messages.iter().filter_map(ipv4_network).collect())
    }

    async fn addr_add(&self, link: &Link, addr: Ipv4Network) -> Result<(), HostError> {
        self.handle
            .address()
            .add(link.index, IpAddr::V4(addr.ip()), addr.prefix())
            .execute()
            .await
            .map_err(classify)
    }

    async fn addr_del(&self, link: &Link, addr: Ipv4Network) -> Result<(), HostError> {
        let messages: Vec<AddressMessage> = self.address_messages(link.index).await?;
        let message: AddressMessage = messages
            .into_iter()
            .find(|m| ipv4_network(m) == Some(addr))
            .ok_or_else(|| HostError::NotFound(format!("{addr} on {}", link.name)))?;

        self.handle
            .address()
            .del(message)
            .execute()
            .await
            .map_err(classify)
    }

    async fn route_append(&self, route: &Route) -> Result<(), HostError> {
        let message = RouteMessageBuilder::<Ipv4Addr>::new()
            .destination_prefix(route.destination.network(), route.destination.prefix())
            .output_interface(route.link_index)
            .pref_source(route.source)
            .scope(RouteScope::Link)
            .build();

        self.handle
            .route()
            .add(message)
            .execute()
            .await
            .map_err(classify)
    }

    async fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), HostError> {
        self.set_link(LinkUnspec::new_with_index(link.index).mtu(mtu).build())
            .await
    }

    async fn set_up(&self, link: &Link) -> Result<(), HostError> {
        self.set_link(LinkUnspec::new_with_index(link.index).up().build())
            .await
    }

    async fn set_down(&self, link: &Link) -> Result<(), HostError> {
        self.set_link(LinkUnspec::new_with_index(link.index).down().build())
            .await
    }

    async fn subscribe_links(&self) -> Result<LinkSubscription, HostError> {
        let (mut connection, _, mut messages) = new_connection()?;
        connection
            .socket_mut()
            .socket_mut()
            .bind(&SocketAddr::new(0, RTMGRP_LINK))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let forward = async {
                while let Some((message, _)) = messages.next().await {
                    let Some(event) = link_event(message) else {
                        continue;
                    };
                    trace!(iface = %event.name, state = %event.state, "link event");
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            };

            tokio::select! {
                _ = connection => debug!("link event connection closed"),
                _ = forward => {}
            }
        });

        Ok(LinkSubscription::new(rx).with_task(task))
    }
}

fn link_from_message(message: LinkMessage) -> Link {
    let mut link = Link::new(String::new(), message.header.index)
        .with_flags(message.header.flags.bits());

    for attribute in message.attributes {
        match attribute {
            LinkAttribute::IfName(name) => link.name = name,
            LinkAttribute::Address(bytes) => link.mac = mac::from_bytes(&bytes),
            LinkAttribute::Mtu(mtu) => link.mtu = Some(mtu),
            _ => {}
        }
    }

    link
}

fn link_event(message: NetlinkMessage<RouteNetlinkMessage>) -> Option<LinkEvent> {
    match message.payload {
        NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewLink(link)) => {
            let link: Link = link_from_message(link);
            Some(LinkEvent {
                state: AdminState::from_flags(link.flags),
                name: link.name,
                index: link.index,
            })
        }
        _ => None,
    }
}

fn ipv4_network(message: &AddressMessage) -> Option<Ipv4Network> {
    if message.header.family != AddressFamily::Inet {
        return None;
    }

    let mut local: Option<Ipv4Addr> = None;
    let mut address: Option<Ipv4Addr> = None;
    for attribute in &message.attributes {
        match attribute {
            AddressAttribute::Local(IpAddr::V4(ip)) => local = Some(*ip),
            AddressAttribute::Address(IpAddr::V4(ip)) => address = Some(*ip),
            _ => {}
        }
    }

    // IFA_LOCAL is the interface address, IFA_ADDRESS the peer on p2p links.
    let ip: Ipv4Addr = local.or(address)?;
    Ipv4Network::new(ip, message.header.prefix_len).ok()
}

/// Positive errno carried by a kernel error reply.
fn errno(error: &rtnetlink::Error) -> Option<i32> {
    match error {
        rtnetlink::Error::NetlinkError(message) => message.code.map(|code| -NonZeroI32::get(code)),
        _ => None,
    }
}

fn classify(error: rtnetlink::Error) -> HostError {
    match errno(&error) {
        Some(libc::EEXIST) => HostError::AlreadyExists,
        _ => HostError::Netlink(error.to_string()),
    }
}
