use pretty_assertions::assert_eq;

const REFERENCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<device name="Heart Rate Sensor">
    <service name="Heart Rate" uuid="180D">
        <characteristic name="Heart Rate Measurement" uuid="2A37">
            <Properties>
                <Notify>Mandatory</Notify>
            </Properties>
        </characteristic>
    </service>
    <service name="Battery" id="0000180F-0000-1000-8000-00805F9B34FB">
        <characteristic name="Battery Level" uuid="2a19">
            <Requirement>Optional</Requirement>
            <Properties>
                <Read>Mandatory</Read>
                <Notify>Excluded</Notify>
                <Vendor>Mandatory</Vendor>
            </Properties>
        </characteristic>
    </service>
</device>
"#;

fn uuid(value: &str) -> gattcheck::GattUuid {
    value.parse().expect("uuid should parse")
}

fn observed_sensor(battery: bool) -> gattcheck::Device {
    let heart_rate = gattcheck::Service::new("Heart Rate", uuid("180D"))
        .with_characteristic(gattcheck::Characteristic::new(
            "Heart Rate Measurement",
            uuid("2A37"),
            gattcheck::PropertySet::empty()
                .with(gattcheck::Property::Read)
                .with(gattcheck::Property::Notify),
        ))
        .expect("characteristic should be unique");
    let device = gattcheck::Device::new("Heart Rate Sensor")
        .with_service(heart_rate)
        .expect("service should be unique");
    if !battery {
        return device;
    }
    let battery = gattcheck::Service::new("", uuid("180F"))
        .with_characteristic(gattcheck::Characteristic::new(
            "",
            uuid("2A19"),
            gattcheck::PropertySet::empty().with(gattcheck::Property::Read),
        ))
        .expect("characteristic should be unique");
    device.with_service(battery).expect("service should be unique")
}

#[test]
fn decoded_reference_canonicalises_and_ignores_unknown_fields() -> anyhow::Result<()> {
    let reference = gattcheck::decode_document(REFERENCE)?;

    assert_eq!("Heart Rate Sensor", reference.name());
    assert_eq!(2, reference.service_count());
    let battery = reference
        .find_service(&uuid("180f"))
        .expect("battery service should decode through the id alias");
    let level = &battery.characteristics()[0];
    assert_eq!(
        "00002a19-0000-1000-8000-00805f9b34fb",
        level.id().to_string()
    );
    assert_eq!(gattcheck::Requirement::Optional, level.requirement());
    assert_eq!(
        gattcheck::PropertySet::empty().with(gattcheck::Property::Read),
        level.properties()
    );
    Ok(())
}

#[test]
fn encoded_reference_decodes_to_the_same_device() -> anyhow::Result<()> {
    let reference = gattcheck::decode_document(REFERENCE)?;

    let text = gattcheck::encode_document(&reference)?;

    assert_eq!(reference, gattcheck::decode_document(&text)?);
    Ok(())
}

#[test]
fn superset_observation_matches_the_reference() -> anyhow::Result<()> {
    let reference = gattcheck::decode_document(REFERENCE)?;

    let report = gattcheck::compare(&reference, &observed_sensor(true));

    assert!(report.matched(), "unexpected discrepancies: {:?}", report.lines());
    Ok(())
}

#[test]
fn missing_battery_service_is_reported_with_the_count() -> anyhow::Result<()> {
    let reference = gattcheck::decode_document(REFERENCE)?;

    let report = gattcheck::compare(&reference, &observed_sensor(false));

    assert_eq!(
        vec![
            gattcheck::Discrepancy::MissingService {
                service: uuid("180F"),
            },
            gattcheck::Discrepancy::ServiceCountMismatch {
                expected: 2,
                actual: 1,
            },
        ],
        report.discrepancies()
    );
    Ok(())
}

#[test]
fn stored_documents_round_trip_through_the_filesystem() -> anyhow::Result<()> {
    let output_dir = tempfile::tempdir()?;
    let device = observed_sensor(true);

    let path = gattcheck::store_document(&output_dir.path().join("profiles"), &device)?;

    assert_eq!(
        Some("Heart Rate Sensor.xml"),
        path.file_name().and_then(|name| name.to_str())
    );
    assert_eq!(device, gattcheck::load_document(&path)?);
    Ok(())
}

#[test]
fn duplicate_services_are_rejected() {
    let text = r#"<device name="Twin"><service uuid="180D"/><service uuid="0000180d-0000-1000-8000-00805f9b34fb"/></device>"#;

    let result = gattcheck::decode_document(text);

    assert!(matches!(
        result,
        Err(gattcheck::DocumentError::Profile(
            gattcheck::ProfileError::DuplicateService { .. }
        ))
    ));
}
