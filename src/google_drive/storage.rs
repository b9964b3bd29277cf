use serde::{Deserialize, Serialize};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Storage usage of the signed-in account, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageQuota {
    pub usage: u64,
    /// `None` for accounts without a limit.
    pub limit: Option<u64>,
    pub usage_in_drive: u64,
    pub usage_in_trash: u64,
}

impl StorageQuota {
    pub fn usage_percentage(&self) -> f64 {
        match self.limit {
            Some(limit) if limit > 0 => {
                let percentage = self.usage as f64 / limit as f64 * 100.0;
                (percentage * 100.0).round() / 100.0
            }
            _ => 0.0,
        }
    }
}

/// The JSON body of `GET /api/drive/storage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    pub usage: u64,
    pub limit: Option<u64>,
    pub usage_in_drive: u64,
    pub usage_in_trash: u64,
    pub formatted_usage: String,
    pub formatted_limit: String,
    pub usage_percentage: f64,
}

impl From<StorageQuota> for StorageReport {
    fn from(quota: StorageQuota) -> Self {
        StorageReport {
            usage: quota.usage,
            limit: quota.limit,
            usage_in_drive: quota.usage_in_drive,
            usage_in_trash: quota.usage_in_trash,
            formatted_usage: format_size(quota.usage),
            formatted_limit: quota
                .limit
                .map(format_size)
                .unwrap_or_else(|| "Unlimited".to_string()),
            usage_percentage: quota.usage_percentage(),
        }
    }
}

/// Human readable size with at most two decimals, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_trims_trailing_zeros() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_073_741_824), "1 GB");
        assert_eq!(format_size(12345), "12.06 KB");
    }

    #[test]
    fn report_from_quota() {
        let report = StorageReport::from(StorageQuota {
            usage: 1_073_741_824,
            limit: Some(15 * 1_073_741_824),
            usage_in_drive: 858_993_459,
            usage_in_trash: 214_748_365,
        });
        assert_eq!(report.formatted_usage, "1 GB");
        assert_eq!(report.formatted_limit, "15 GB");
        assert_eq!(report.usage_percentage, 6.67);
    }

    #[test]
    fn unlimited_accounts_report_zero_percent() {
        let quota = StorageQuota {
            usage: 10,
            ..Default::default()
        };
        let report = StorageReport::from(quota);
        assert_eq!(report.usage_percentage, 0.0);
        assert_eq!(report.formatted_limit, "Unlimited");
    }
}
