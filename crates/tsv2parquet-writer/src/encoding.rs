use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use tsv2parquet_config::{Compression as CompressionSetting, ParquetConfig};

fn compression_setting(setting: CompressionSetting) -> Compression {
    match setting {
        CompressionSetting::Snappy => Compression::SNAPPY,
        CompressionSetting::Zstd => {
            let level = ZstdLevel::try_new(2).unwrap_or_default();
            Compression::ZSTD(level)
        }
    }
}

/// Writer properties for one output file
///
/// - Configured compression (Snappy by default)
/// - Dictionary encoding enabled
/// - Page-level statistics
/// - Producer, table and data version embedded in file metadata
pub fn writer_properties(config: &ParquetConfig, table: &str, version: &str) -> WriterProperties {
    let metadata = vec![
        KeyValue {
            key: "tsv2parquet.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
        KeyValue {
            key: "source.table".to_string(),
            value: Some(table.to_string()),
        },
        KeyValue {
            key: "source.data_version".to_string(),
            value: Some(version.to_string()),
        },
    ];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting(config.compression))
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(config.row_group_size.max(1))
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_follow_config() {
        let config = ParquetConfig {
            row_group_size: 1000,
            compression: CompressionSetting::Zstd,
        };
        let props = writer_properties(&config, "g_patent", "20251209");

        assert_eq!(props.max_row_group_size(), 1000);
        assert!(matches!(
            props.compression(&parquet::schema::types::ColumnPath::from("x")),
            Compression::ZSTD(_)
        ));

        let kv = props.key_value_metadata().unwrap();
        assert!(kv
            .iter()
            .any(|e| e.key == "source.table" && e.value.as_deref() == Some("g_patent")));
    }
}
