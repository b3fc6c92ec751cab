// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::IpAddr;

use crate::utils::url_utils::strip_www;

/// 私有、环回、链路本地、组播或未指定地址
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let o = ipv4.octets();
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_multicast()
                || ipv4.is_unspecified()
                || ipv4.is_broadcast()
                // 100.64.0.0/10 (CGNAT)
                || (o[0] == 100 && (64..=127).contains(&o[1]))
        }
        IpAddr::V6(ipv6) => {
            if let Some(v4) = ipv6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(v4));
            }
            let seg = ipv6.segments()[0];
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique Local Address (fc00::/7)
                || (seg & 0xfe00) == 0xfc00
                // Link-local (fe80::/10)
                || (seg & 0xffc0) == 0xfe80
                // Multicast (ff00::/8)
                || (seg & 0xff00) == 0xff00
        }
    }
}

/// 主机是否与调查中的域名属于同一站点
///
/// 同一主机、`www.` 变体或其子域都算同站。
pub fn same_site(host: &str, site: &str) -> bool {
    let host = strip_www(host);
    let site = strip_www(site);
    host == site || host.ends_with(&format!(".{}", site))
}
