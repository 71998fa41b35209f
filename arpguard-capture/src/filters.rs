//! BPF filters for ARP capture

/// All untagged ARP frames
pub fn arp_filter() -> String {
    "arp".to_string()
}

/// ARP frames, untagged or inside one 802.1Q tag
pub fn arp_with_vlan_filter() -> String {
    format!("{} or (vlan and {})", arp_filter(), arp_filter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        assert_eq!(arp_filter(), "arp");
        assert_eq!(arp_with_vlan_filter(), "arp or (vlan and arp)");
    }
}
