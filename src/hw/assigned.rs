//! Bluetooth SIG assigned names for attributes commonly found on peripherals.

use crate::profile::GattUuid;

const SERVICES: [(u32, &str); 8] = [
    (0x1800, "Generic Access"),
    (0x1801, "Generic Attribute"),
    (0x180A, "Device Information"),
    (0x180D, "Heart Rate"),
    (0x180F, "Battery Service"),
    (0x1812, "Human Interface Device"),
    (0x1816, "Cycling Speed and Cadence"),
    (0x181A, "Environmental Sensing"),
];

const CHARACTERISTICS: [(u32, &str); 14] = [
    (0x2A00, "Device Name"),
    (0x2A01, "Appearance"),
    (0x2A04, "Peripheral Preferred Connection Parameters"),
    (0x2A05, "Service Changed"),
    (0x2A19, "Battery Level"),
    (0x2A23, "System ID"),
    (0x2A24, "Model Number String"),
    (0x2A25, "Serial Number String"),
    (0x2A26, "Firmware Revision String"),
    (0x2A27, "Hardware Revision String"),
    (0x2A29, "Manufacturer Name String"),
    (0x2A37, "Heart Rate Measurement"),
    (0x2A38, "Body Sensor Location"),
    (0x2A39, "Heart Rate Control Point"),
];

const DESCRIPTORS: [(u32, &str); 9] = [
    (0x2900, "Characteristic Extended Properties"),
    (0x2901, "Characteristic User Description"),
    (0x2902, "Client Characteristic Configuration"),
    (0x2903, "Server Characteristic Configuration"),
    (0x2904, "Characteristic Presentation Format"),
    (0x2905, "Characteristic Aggregate Format"),
    (0x2906, "Valid Range"),
    (0x2907, "External Report Reference"),
    (0x2908, "Report Reference"),
];

pub(crate) fn service_name(uuid: &GattUuid) -> Option<&'static str> {
    lookup(&SERVICES, uuid)
}

pub(crate) fn characteristic_name(uuid: &GattUuid) -> Option<&'static str> {
    lookup(&CHARACTERISTICS, uuid)
}

pub(crate) fn descriptor_name(uuid: &GattUuid) -> Option<&'static str> {
    lookup(&DESCRIPTORS, uuid)
}

fn lookup(table: &[(u32, &'static str)], uuid: &GattUuid) -> Option<&'static str> {
    let short = uuid.short()?;
    table
        .iter()
        .find(|(number, _name)| *number == short)
        .map(|(_number, name)| *name)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x2902, Some("Client Characteristic Configuration"))]
    #[case(0x2908, Some("Report Reference"))]
    #[case(0x2909, None)]
    fn descriptor_name_covers_well_known_descriptors(
        #[case] number: u16,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(expected, descriptor_name(&GattUuid::from_u16(number)));
    }

    #[test]
    fn vendor_uuids_have_no_assigned_name() {
        let vendor: GattUuid = "d44bc439-abfd-45a2-b575-925416129600"
            .parse()
            .expect("vendor uuid should parse");
        assert_eq!(None, service_name(&vendor));
    }
}
