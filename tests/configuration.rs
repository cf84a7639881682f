use nwb_dataset_io::configuration::{
    Hdf5Compression, Hdf5DatasetIOConfiguration, ZarrCompression, ZarrDatasetIOConfiguration,
    human_readable_size,
};
use nwb_dataset_io::nwbfile::IoMode;
use nwb_dataset_io::{Backend, BackendConfiguration, DataType, DatasetIOConfiguration, DatasetInfo, Error};

fn init_logger() {
    env_logger::try_init().ok();
}

fn electrical_series_info() -> DatasetInfo {
    DatasetInfo::new(
        "481a0860-3a0c-40ec-b931-df4a3e9b101f",
        "acquisition/TestElectricalSeries/data",
        vec![1_800_000, 384],
        DataType::Int16,
    )
}

fn zarr_configuration() -> ZarrDatasetIOConfiguration {
    ZarrDatasetIOConfiguration::new(electrical_series_info(), vec![78_125, 64], vec![1_250_000, 384])
        .expect("valid configuration")
}

fn hdf5_configuration() -> Hdf5DatasetIOConfiguration {
    Hdf5DatasetIOConfiguration::new(electrical_series_info(), vec![78_125, 64], vec![1_250_000, 384])
        .expect("valid configuration")
}

#[test]
fn sizes() {
    assert_eq!(human_readable_size(512), "512 B");
    assert_eq!(human_readable_size(10_000_000), "10.00 MB");
    assert_eq!(human_readable_size(1_382_400_000), "1.38 GB");
}

#[test]
fn parse_names() {
    assert_eq!("zarr".parse::<Backend>().expect("backend"), Backend::Zarr);
    assert_eq!("hdf5".parse::<Backend>().expect("backend"), Backend::Hdf5);
    assert!("n5".parse::<Backend>().is_err());
    assert_eq!("r+".parse::<IoMode>().expect("mode"), IoMode::ReadWrite);
    assert!("a".parse::<IoMode>().expect("mode").is_append());
    assert!(!"r".parse::<IoMode>().expect("mode").is_append());
}

#[test]
fn zarr_display() {
    init_logger();
    let expected = "
acquisition/TestElectricalSeries/data
-------------------------------------
  dtype: int16
  full shape of source array: (1800000, 384)
  full size of source array: 1.38 GB

  buffer shape: (1250000, 384)
  expected RAM usage: 960.00 MB

  chunk shape: (78125, 64)
  disk space usage per chunk: 10.00 MB

  compression method: gzip (level 1)";
    assert_eq!(zarr_configuration().to_string(), expected);
}

#[test]
fn hdf5_display_without_compression() {
    init_logger();
    let configuration = hdf5_configuration()
        .with_compression(None)
        .expect("no compression is valid");
    assert!(
        configuration
            .to_string()
            .ends_with("  compression method: none")
    );
}

#[test]
fn invalid_shapes_are_rejected() {
    init_logger();
    let err = ZarrDatasetIOConfiguration::new(
        electrical_series_info(),
        vec![78_125, 64],
        vec![100_000, 384],
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidShape(_)));

    let err = Hdf5DatasetIOConfiguration::new(
        electrical_series_info(),
        vec![78_125, 500],
        vec![78_125, 500],
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidShape(_)));
}

#[test]
fn hdf5_filter_pipeline() {
    init_logger();
    let mut configuration = hdf5_configuration();
    configuration.shuffle = true;
    configuration.fletcher32 = true;

    let filters = configuration.filter_pipeline().expect("valid filters");
    let summary: Vec<_> = filters
        .iter()
        .map(|f| (f.id, f.name.as_str(), f.client_data.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (2, "shuffle", vec![2]),
            (1, "deflate", vec![4]),
            (3, "fletcher32", vec![]),
        ]
    );

    let configuration = configuration
        .with_compression(Some(Hdf5Compression::Szip {
            nearest_neighbour: true,
            pixels_per_block: 8,
        }))
        .expect("valid szip");
    let filters = configuration.filter_pipeline().expect("valid filters");
    assert_eq!(filters[1].name, "szip");
    assert_eq!(filters[1].client_data, vec![32, 8]);
}

#[test]
fn invalid_compression_is_rejected() {
    init_logger();
    assert!(
        hdf5_configuration()
            .with_compression(Some(Hdf5Compression::Gzip { level: 10 }))
            .is_err()
    );
    assert!(
        hdf5_configuration()
            .with_compression(Some(Hdf5Compression::Zstd { level: 0 }))
            .is_err()
    );
    assert!(
        zarr_configuration()
            .with_compression(Some(ZarrCompression::Bz2 { level: 10 }))
            .is_err()
    );
}

#[test]
fn zarr_array_metadata() {
    init_logger();
    let configuration = zarr_configuration()
        .with_compression(Some(ZarrCompression::Zstd {
            level: 5,
            checksum: false,
        }))
        .expect("valid zstd");
    let metadata = configuration.to_array_metadata().expect("metadata");
    let json = serde_json::to_value(&metadata).expect("serializable");

    assert_eq!(json["shape"], serde_json::json!([1_800_000, 384]));
    assert_eq!(json["data_type"], "int16");
    assert_eq!(json["chunk_grid"]["name"], "regular");
    assert_eq!(
        json["chunk_grid"]["configuration"]["chunk_shape"],
        serde_json::json!([78_125, 64])
    );
    assert_eq!(json["codecs"][0]["name"], "bytes");
    assert_eq!(json["codecs"][1]["name"], "zstd");
    assert_eq!(
        json["attributes"]["object_id"],
        "481a0860-3a0c-40ec-b931-df4a3e9b101f"
    );
}

#[test]
fn backend_configuration_insert() {
    init_logger();
    let mut backend_configuration = BackendConfiguration::new(Backend::Zarr);
    assert!(backend_configuration.is_empty());
    assert!(
        backend_configuration
            .insert(zarr_configuration().into())
            .expect("matching backend")
    );
    assert!(
        !backend_configuration
            .insert(zarr_configuration().into())
            .expect("duplicate is ignored")
    );
    assert_eq!(backend_configuration.len(), 1);

    let err = backend_configuration
        .insert(hdf5_configuration().into())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::BackendMismatch {
            detected: Backend::Hdf5,
            specified: Backend::Zarr
        }
    ));
}

#[test]
fn backend_configuration_json() {
    init_logger();
    let mut backend_configuration = BackendConfiguration::new(Backend::Zarr);
    backend_configuration
        .insert(zarr_configuration().into())
        .expect("insert");

    let json = backend_configuration.to_json().expect("serializable");
    assert!(json.contains("\"backend\": \"zarr\""));
    assert!(json.contains("\"method\": \"gzip\""));
    let parsed = BackendConfiguration::from_json(&json).expect("valid json");
    assert_eq!(parsed, backend_configuration);

    let location = "acquisition/TestElectricalSeries/data";
    let Some(DatasetIOConfiguration::Zarr(configuration)) = backend_configuration.get_mut(location)
    else {
        panic!("zarr configuration at {location}");
    };
    configuration.buffer_shape = vec![100_000, 384];
    let json = backend_configuration.to_json().expect("serializable");
    let err = BackendConfiguration::from_json(&json).unwrap_err();
    assert!(matches!(err, Error::SerdeJson(_)));
    assert!(err.to_string().contains("not a multiple of chunk shape"), "{err}");
    assert!(serde_json::from_str::<BackendConfiguration>(&json).is_err());
}

#[test]
fn deserializing_validates_single_configuration() {
    init_logger();
    let info = DatasetInfo::new("object", "acquisition/Traces/data", vec![100, 4], DataType::Int16);
    let configuration: DatasetIOConfiguration =
        ZarrDatasetIOConfiguration::new(info, vec![10, 4], vec![20, 4])
            .expect("valid configuration")
            .into();
    let mut value = serde_json::to_value(&configuration).expect("serializable");
    let parsed: DatasetIOConfiguration =
        serde_json::from_value(value.clone()).expect("valid configuration");
    assert_eq!(parsed, configuration);

    value["buffer_shape"] = serde_json::json!([15, 4]);
    assert!(serde_json::from_value::<DatasetIOConfiguration>(value.clone()).is_err());
    assert!(serde_json::from_value::<ZarrDatasetIOConfiguration>(value).is_err());
}

#[test]
fn deserializing_validates_hdf5_compression() {
    init_logger();
    let mut value = serde_json::to_value(hdf5_configuration()).expect("serializable");
    let parsed: Hdf5DatasetIOConfiguration =
        serde_json::from_value(value.clone()).expect("valid configuration");
    assert_eq!(parsed, hdf5_configuration());

    value["compression"] = serde_json::json!({"method": "gzip", "level": 12});
    assert!(serde_json::from_value::<Hdf5DatasetIOConfiguration>(value.clone()).is_err());

    value["compression"] = serde_json::json!({"method": "gzip"});
    value.as_object_mut().expect("object").remove("shuffle");
    let parsed: Hdf5DatasetIOConfiguration =
        serde_json::from_value(value).expect("defaults fill missing fields");
    assert!(!parsed.shuffle);
    assert_eq!(parsed.compression, Some(Hdf5Compression::Gzip { level: 4 }));
}

#[test]
fn backend_configuration_validate_keys() {
    init_logger();
    let mut backend_configuration = BackendConfiguration::new(Backend::Hdf5);
    backend_configuration
        .dataset_configurations
        .insert("acquisition/Other/data".to_string(), hdf5_configuration().into());
    assert!(backend_configuration.validate().is_err());
}

#[test]
fn backend_configuration_display() {
    init_logger();
    let mut backend_configuration = BackendConfiguration::new(Backend::Hdf5);
    backend_configuration
        .insert(hdf5_configuration().into())
        .expect("insert");
    let text = backend_configuration.to_string();
    assert!(text.starts_with("\nHDF5 dataset configurations\n---------------------------\n"));
    assert!(text.ends_with("  compression method: gzip (level 4)"));
}
