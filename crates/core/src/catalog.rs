/// An instance type offered by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceTypeOption {
    pub id: &'static str,
    pub description: &'static str,
    pub price: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOption {
    pub id: &'static str,
    pub name: &'static str,
}

pub const DEFAULT_INSTANCE_TYPE: &str = "t3.large";
pub const DEFAULT_REGION: &str = "ap-northeast-1";

pub const INSTANCE_TYPES: &[InstanceTypeOption] = &[
    InstanceTypeOption {
        id: "t3.micro",
        description: "2 vCPU, 1 GiB RAM - 無料枠対象",
        price: "0.0104 USD/時間",
    },
    InstanceTypeOption {
        id: "t3.small",
        description: "2 vCPU, 2 GiB RAM",
        price: "0.0208 USD/時間",
    },
    InstanceTypeOption {
        id: "t3.medium",
        description: "2 vCPU, 4 GiB RAM",
        price: "0.0416 USD/時間",
    },
    InstanceTypeOption {
        id: "t3.large",
        description: "2 vCPU, 8 GiB RAM",
        price: "0.0832 USD/時間",
    },
    InstanceTypeOption {
        id: "t3.xlarge",
        description: "4 vCPU, 16 GiB RAM",
        price: "0.1664 USD/時間",
    },
];

pub const REGIONS: &[RegionOption] = &[
    RegionOption {
        id: "ap-northeast-1",
        name: "東京 (ap-northeast-1)",
    },
    RegionOption {
        id: "us-east-1",
        name: "米国東部（バージニア北部） (us-east-1)",
    },
    RegionOption {
        id: "us-west-2",
        name: "米国西部（オレゴン） (us-west-2)",
    },
    RegionOption {
        id: "eu-west-1",
        name: "ヨーロッパ（アイルランド） (eu-west-1)",
    },
];

pub fn instance_type(id: &str) -> Option<&'static InstanceTypeOption> {
    INSTANCE_TYPES.iter().find(|t| t.id == id)
}

pub fn region(id: &str) -> Option<&'static RegionOption> {
    REGIONS.iter().find(|r| r.id == id)
}
