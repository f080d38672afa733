//! Assembly of the CoreOS cluster stack.
//!
//! Declares, in one pass, the network (VPC, private and public subnets in
//! three availability zones, gateway and routing), the security groups, the
//! auto-scaled CoreOS fleet behind an HTTP/HTTPS load balancer, the RDS
//! database, the S3 bucket and the Route53 record. Region and profile
//! specific constants live in the tables below.

use tracing::info;

use crate::template::{
    DeletionPolicy, Error, IngressRule, IngressSource, Mapping, MappingHandle, Output, Parameter,
    ParameterHandle, ParameterType, Pseudo, Resource, ResourceHandle, TemplateBuilder, Value,
};

pub const DEFAULT_DESCRIPTION: &str = "CoreOS cluster with load balancer, database, bucket and DNS";

/// CoreOS stable AMIs.
const REGION_AMIS: &[(&str, &str)] = &[
    ("ap-northeast-1", "ami-253b7324"),
    ("sa-east-1", "ami-8fab0492"),
    ("ap-southeast-2", "ami-9f0c68a5"),
    ("ap-southeast-1", "ami-ac1b44fe"),
    ("us-east-1", "ami-820ff0ea"),
    ("us-west-2", "ami-7b8ff24b"),
    ("us-west-1", "ami-ea5650af"),
    ("eu-west-1", "ami-a73bf2d0"),
];

const INSTANCE_TYPES: &[&str] = &[
    "t1.micro",
    "m1.small",
    "m1.medium",
    "m1.large",
    "m1.xlarge",
    "m3.xlarge",
    "m3.2xlarge",
    "m2.xlarge",
    "m2.2xlarge",
    "m2.4xlarge",
    "c1.medium",
    "c1.xlarge",
    "c3.xlarge",
    "cc1.4xlarge",
    "cc2.8xlarge",
    "cg1.4xlarge",
    "hi1.4xlarge",
    "hs1.8xlarge",
];

struct Profile {
    name: &'static str,
    db_instance_class: &'static str,
    db_allocated_storage: &'static str,
    db_multi_az: &'static str,
    volume_size: &'static str,
}

const PROFILES: &[Profile] = &[
    Profile {
        name: "development",
        db_instance_class: "db.t2.micro",
        db_allocated_storage: "5",
        db_multi_az: "false",
        volume_size: "50",
    },
    Profile {
        name: "staging",
        db_instance_class: "db.m3.medium",
        db_allocated_storage: "20",
        db_multi_az: "false",
        volume_size: "50",
    },
    Profile {
        name: "production",
        db_instance_class: "db.m3.large",
        db_allocated_storage: "100",
        db_multi_az: "true",
        volume_size: "100",
    },
];

struct Zone {
    suffix: &'static str,
    index: usize,
    private_cidr: &'static str,
    public_cidr: &'static str,
}

const ZONES: &[Zone] = &[
    Zone {
        suffix: "a",
        index: 0,
        private_cidr: "172.32.16.0/20",
        public_cidr: "172.32.0.0/20",
    },
    Zone {
        suffix: "b",
        index: 1,
        private_cidr: "172.32.32.0/20",
        public_cidr: "172.32.64.0/20",
    },
    Zone {
        suffix: "c",
        index: 2,
        private_cidr: "172.32.48.0/20",
        public_cidr: "172.32.80.0/20",
    },
];

const VPC_CIDR: &str = "172.32.0.0/16";
const CLUSTER_PORT: i64 = 7777;
const DATABASE_PORT: i64 = 5432;
const MIN_CLUSTER_SIZE: i64 = 3;
const MAX_CLUSTER_SIZE: i64 = 12;

/// Values obtained outside the template: the cloud-init body with the
/// discovery token already spliced in, and the token itself.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    pub region: Option<String>,
    pub user_data: String,
    pub discovery_token: String,
    pub description: Option<String>,
}

struct Parameters {
    instance_type: ParameterHandle,
    cluster_size: ParameterHandle,
    allow_ssh_from: ParameterHandle,
    key_pair: ParameterHandle,
    profile: ParameterHandle,
    db_username: ParameterHandle,
    db_password: ParameterHandle,
    hosted_zone: ParameterHandle,
    certificate: ParameterHandle,
}

struct Network {
    vpc: ResourceHandle,
    gateway: ResourceHandle,
    private_subnets: Vec<ResourceHandle>,
    public_subnets: Vec<ResourceHandle>,
}

struct SecurityGroups {
    public: ResourceHandle,
    cluster: ResourceHandle,
    database: ResourceHandle,
}

fn cluster_tags(name: &str) -> Value {
    Value::tags([
        ("IoCluster", Value::pseudo(Pseudo::StackName)),
        (
            "Name",
            Value::join("-", [Value::pseudo(Pseudo::StackName), Value::from(name)]),
        ),
    ])
}

fn references(handles: &[ResourceHandle]) -> Value {
    Value::List(handles.iter().map(ResourceHandle::reference).collect())
}

fn region_map() -> Mapping {
    REGION_AMIS
        .iter()
        .fold(Mapping::new("RegionMap"), |mapping, (region, ami)| {
            mapping.entry(*region, [("AMI", *ami)])
        })
}

fn profile_map() -> Mapping {
    PROFILES
        .iter()
        .fold(Mapping::new("ProfileMap"), |mapping, profile| {
            mapping.entry(
                profile.name,
                [
                    ("DBInstanceClass", profile.db_instance_class),
                    ("DBAllocatedStorage", profile.db_allocated_storage),
                    ("DBMultiAZ", profile.db_multi_az),
                    ("VolumeSize", profile.volume_size),
                ],
            )
        })
}

fn declare_parameters(template: &mut TemplateBuilder) -> Result<Parameters, Error> {
    let instance_type = template.declare_parameter(
        Parameter::string("InstanceType")
            .description("EC2 instance type (m1.small, etc).")
            .default_value("m3.2xlarge")
            .allowed_values(INSTANCE_TYPES.iter().copied())
            .constraint_description("must be a valid EC2 instance type."),
    )?;

    let cluster_size = template.declare_parameter(
        Parameter::number("ClusterSize")
            .description("Number of nodes in cluster (3-12)")
            .range(MIN_CLUSTER_SIZE, MAX_CLUSTER_SIZE)
            .default_value(MIN_CLUSTER_SIZE.to_string()),
    )?;

    let allow_ssh_from = template.declare_parameter(
        Parameter::string("AllowSSHFrom")
            .description("The net block (CIDR) that SSH is available to.")
            .length(9, 18)
            .default_value("0.0.0.0/0")
            .allowed_pattern(r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})/(\d{1,2})")
            .constraint_description("must be a valid IP CIDR range of the form x.x.x.x/x."),
    )?;

    let key_pair = template.declare_parameter(
        Parameter::new("KeyPair", ParameterType::KeyPairName)
            .description("The name of an EC2 Key Pair to allow SSH access to the instance."),
    )?;

    let profile = template.declare_parameter(
        Parameter::string("Profile")
            .description("Deployment profile driving database and volume sizing.")
            .default_value(PROFILES[0].name)
            .allowed_values(PROFILES.iter().map(|profile| profile.name))
            .constraint_description("must be one of the known deployment profiles."),
    )?;

    let db_username = template.declare_parameter(
        Parameter::string("DBUsername")
            .description("Master user name of the database.")
            .default_value("coreos")
            .length(1, 16)
            .allowed_pattern("[a-zA-Z][a-zA-Z0-9]*")
            .constraint_description("must begin with a letter and contain only alphanumeric characters."),
    )?;

    let db_password = template.declare_parameter(
        Parameter::string("DBPassword")
            .description("Master password of the database.")
            .length(8, 41)
            .allowed_pattern("[a-zA-Z0-9]*")
            .constraint_description("must contain only alphanumeric characters.")
            .sensitive(),
    )?;

    let hosted_zone = template.declare_parameter(
        Parameter::string("HostedZoneName")
            .description("Route53 hosted zone the cluster record is created in, with the trailing dot.")
            .allowed_pattern(r"([a-zA-Z0-9-]+\.)+")
            .constraint_description("must be a domain name ending with a dot."),
    )?;

    let certificate = template.declare_parameter(
        Parameter::string("CertificateId")
            .description("ARN of the TLS certificate served by the load balancer.")
            .allowed_pattern("arn:aws[a-z-]*:(iam|acm):.*")
            .constraint_description("must be an IAM or ACM certificate ARN."),
    )?;

    return Ok(Parameters {
        instance_type,
        cluster_size,
        allow_ssh_from,
        key_pair,
        profile,
        db_username,
        db_password,
        hosted_zone,
        certificate,
    });
}

fn declare_network(template: &mut TemplateBuilder) -> Result<Network, Error> {
    let vpc = template.declare_resource(
        Resource::new("ioVPC", "AWS::EC2::VPC")
            .property("CidrBlock", VPC_CIDR)
            .property("EnableDnsSupport", true)
            .property("EnableDnsHostnames", true)
            .property("Tags", cluster_tags("vpc")),
    )?;

    let mut private_subnets = Vec::new();
    for zone in ZONES {
        private_subnets.push(template.declare_resource(
            Resource::new(format!("ioPrivateSubnet{}", zone.suffix), "AWS::EC2::Subnet")
                .property("AvailabilityZone", Value::select(zone.index, Value::azs()))
                .property("CidrBlock", zone.private_cidr)
                .property("VpcId", vpc.reference())
                .property("Tags", cluster_tags(&format!("privateSubnet-{}", zone.suffix))),
        )?);
    }

    let mut public_subnets = Vec::new();
    for zone in ZONES {
        public_subnets.push(template.declare_resource(
            Resource::new(format!("ioPublicSubnet{}", zone.suffix), "AWS::EC2::Subnet")
                .property("AvailabilityZone", Value::select(zone.index, Value::azs()))
                .property("CidrBlock", zone.public_cidr)
                .property("VpcId", vpc.reference())
                .property("Tags", cluster_tags(&format!("publicSubnet-{}", zone.suffix))),
        )?);
    }

    let gateway = template.declare_resource(
        Resource::new("ioGateway", "AWS::EC2::InternetGateway")
            .property("Tags", cluster_tags("gateway")),
    )?;

    template.declare_resource(
        Resource::new("IgAttachment", "AWS::EC2::VPCGatewayAttachment")
            .property("InternetGatewayId", gateway.reference())
            .property("VpcId", vpc.reference()),
    )?;

    let route_table = template.declare_resource(
        Resource::new("ioRouteTable", "AWS::EC2::RouteTable")
            .property("VpcId", vpc.reference())
            .property("Tags", cluster_tags("routeTable")),
    )?;

    template.declare_resource(
        Resource::new("ioRoute", "AWS::EC2::Route")
            .property("RouteTableId", route_table.reference())
            .property("DestinationCidrBlock", "0.0.0.0/0")
            .property("GatewayId", gateway.reference()),
    )?;

    let associations = public_subnets
        .iter()
        .map(|subnet| ("public", subnet))
        .chain(private_subnets.iter().map(|subnet| ("private", subnet)));
    for ((visibility, subnet), zone) in associations.zip(ZONES.iter().cycle()) {
        template.declare_resource(
            Resource::new(
                format!(
                    "{}{}SubnetRouteAssociation",
                    visibility,
                    zone.suffix.to_uppercase()
                ),
                "AWS::EC2::SubnetRouteTableAssociation",
            )
            .property("SubnetId", subnet.reference())
            .property("RouteTableId", route_table.reference()),
        )?;
    }

    return Ok(Network {
        vpc,
        gateway,
        private_subnets,
        public_subnets,
    });
}

fn declare_security_groups(
    template: &mut TemplateBuilder,
    network: &Network,
    parameters: &Parameters,
) -> Result<SecurityGroups, Error> {
    let anywhere = || IngressSource::Cidr(Value::from("0.0.0.0/0"));

    // Reachable over HTTP(S); the front load balancer sits in it.
    let public = template.declare_resource(
        Resource::new("publicSG", "AWS::EC2::SecurityGroup")
            .property("VpcId", network.vpc.reference())
            .property("GroupDescription", "Enable HTTP, HTTPs access from everywhere")
            .property(
                "SecurityGroupIngress",
                Value::List(vec![IngressRule::tcp(80, anywhere()).to_value()]),
            )
            .property("Tags", cluster_tags("public-SG")),
    )?;
    template.add_ingress_rule(&public, IngressRule::tcp(443, anywhere()))?;

    // Every cluster host. SSH from the configured block, everything between
    // members of the group.
    let cluster = template.declare_resource(
        Resource::new("IOClusterSG", "AWS::EC2::SecurityGroup")
            .property("VpcId", network.vpc.reference())
            .property("GroupDescription", "Enable SSH access via port 22")
            .property(
                "SecurityGroupIngress",
                Value::List(vec![IngressRule::tcp(
                    22,
                    IngressSource::Cidr(parameters.allow_ssh_from.reference()),
                )
                .to_value()]),
            )
            .property("Tags", cluster_tags("private-SG")),
    )?;

    let internal_rules = [
        (
            "IoClusterSGInternalIngressALL",
            IngressRule::new("tcp", 0, 65535, IngressSource::SecurityGroup(cluster.reference())),
        ),
        (
            "IoClusterSGInternalIngressALLICMP",
            IngressRule::new("icmp", -1, -1, IngressSource::SecurityGroup(cluster.reference())),
        ),
        (
            "IoClusterSGInternalIngress7777",
            IngressRule::tcp(CLUSTER_PORT, IngressSource::SecurityGroup(public.reference())),
        ),
    ];
    for (name, rule) in internal_rules {
        let resource = rule.fields().into_iter().fold(
            Resource::new(name, "AWS::EC2::SecurityGroupIngress")
                .property("GroupId", cluster.reference()),
            |resource, (key, value)| resource.property(key, value),
        );
        template.declare_resource(resource)?;
    }

    let database = template.declare_resource(
        Resource::new("ioDatabaseSG", "AWS::EC2::SecurityGroup")
            .property("VpcId", network.vpc.reference())
            .property("GroupDescription", "Enable PostgreSQL access from the cluster")
            .property(
                "SecurityGroupIngress",
                Value::List(vec![IngressRule::tcp(
                    DATABASE_PORT,
                    IngressSource::SecurityGroup(cluster.reference()),
                )
                .to_value()]),
            )
            .property("Tags", cluster_tags("database-SG")),
    )?;

    return Ok(SecurityGroups {
        public,
        cluster,
        database,
    });
}

fn declare_load_balancer(
    template: &mut TemplateBuilder,
    network: &Network,
    groups: &SecurityGroups,
    parameters: &Parameters,
) -> Result<ResourceHandle, Error> {
    template.declare_resource(
        Resource::new("FrontHttpLB", "AWS::ElasticLoadBalancing::LoadBalancer")
            .property(
                "ConnectionDrainingPolicy",
                Value::object([("Enabled", Value::from(true)), ("Timeout", Value::Integer(300))]),
            )
            .property("CrossZone", true)
            .property(
                "Listeners",
                Value::list([
                    Value::object([
                        ("LoadBalancerPort", Value::from("80")),
                        ("InstancePort", Value::from(CLUSTER_PORT)),
                        ("Protocol", Value::from("HTTP")),
                    ]),
                    Value::object([
                        ("LoadBalancerPort", Value::from("443")),
                        ("InstancePort", Value::from(CLUSTER_PORT)),
                        ("Protocol", Value::from("HTTPS")),
                        ("InstanceProtocol", Value::from("HTTP")),
                        ("SSLCertificateId", parameters.certificate.reference()),
                    ]),
                ]),
            )
            .property(
                "HealthCheck",
                Value::object([
                    ("Target", format!("TCP:{}", CLUSTER_PORT)),
                    ("HealthyThreshold", String::from("3")),
                    ("UnhealthyThreshold", String::from("5")),
                    ("Interval", String::from("30")),
                    ("Timeout", String::from("5")),
                ]),
            )
            .property("SecurityGroups", Value::list([groups.public.reference()]))
            .property("Subnets", references(&network.public_subnets)),
    )
}

#[allow(clippy::too_many_arguments)]
fn declare_fleet(
    template: &mut TemplateBuilder,
    settings: &ClusterSettings,
    regions: &MappingHandle,
    profiles: &MappingHandle,
    network: &Network,
    groups: &SecurityGroups,
    load_balancer: &ResourceHandle,
    parameters: &Parameters,
) -> Result<(), Error> {
    let image_id = match &settings.region {
        Some(region) => template.find_in_map(regions, region.as_str(), "AMI")?,
        None => template.find_in_map(regions, Value::pseudo(Pseudo::Region), "AMI")?,
    };
    let volume_size = template.find_in_map(profiles, parameters.profile.reference(), "VolumeSize")?;

    let launch_config = template.declare_resource(
        Resource::new("IOClusterLaunchConfig", "AWS::AutoScaling::LaunchConfiguration")
            .depends_on(network.gateway.name())
            .property("ImageId", image_id)
            .property("AssociatePublicIpAddress", true)
            .property("InstanceType", parameters.instance_type.reference())
            .property("KeyName", parameters.key_pair.reference())
            .property("SecurityGroups", Value::list([groups.cluster.reference()]))
            .property(
                "BlockDeviceMappings",
                Value::list([Value::object([
                    ("DeviceName", Value::from("/dev/sda")),
                    (
                        "Ebs",
                        Value::object([
                            ("DeleteOnTermination", Value::from("true")),
                            ("VolumeSize", volume_size),
                        ]),
                    ),
                ])]),
            )
            .property("UserData", Value::base64(settings.user_data.as_str())),
    )?;

    let zones = Value::List(
        ZONES
            .iter()
            .map(|zone| Value::select(zone.index, Value::azs()))
            .collect(),
    );
    template.declare_resource(
        Resource::new("IOClusterAutoScale", "AWS::AutoScaling::AutoScalingGroup")
            .property("MinSize", MIN_CLUSTER_SIZE.to_string())
            .property("MaxSize", MAX_CLUSTER_SIZE.to_string())
            .property("AvailabilityZones", zones)
            .property("LaunchConfigurationName", launch_config.reference())
            .property("DesiredCapacity", parameters.cluster_size.reference())
            .property("LoadBalancerNames", Value::list([load_balancer.reference()]))
            .property("VPCZoneIdentifier", references(&network.private_subnets))
            .property(
                "Tags",
                Value::list([Value::object([
                    ("Key", Value::from("IoCluster")),
                    ("Value", Value::pseudo(Pseudo::StackName)),
                    ("PropagateAtLaunch", Value::from(true)),
                ])]),
            ),
    )?;

    return Ok(());
}

fn declare_database(
    template: &mut TemplateBuilder,
    profiles: &MappingHandle,
    network: &Network,
    groups: &SecurityGroups,
    parameters: &Parameters,
) -> Result<ResourceHandle, Error> {
    let subnet_group = template.declare_resource(
        Resource::new("ioDBSubnetGroup", "AWS::RDS::DBSubnetGroup")
            .property("DBSubnetGroupDescription", "Private subnets of the cluster database")
            .property("SubnetIds", references(&network.private_subnets))
            .property("Tags", cluster_tags("db-subnets")),
    )?;

    let profile = parameters.profile.reference();
    let instance_class = template.find_in_map(profiles, profile.clone(), "DBInstanceClass")?;
    let storage = template.find_in_map(profiles, profile.clone(), "DBAllocatedStorage")?;
    let multi_az = template.find_in_map(profiles, profile, "DBMultiAZ")?;

    template.declare_resource(
        Resource::new("ioDatabase", "AWS::RDS::DBInstance")
            .deletion_policy(DeletionPolicy::Snapshot)
            .property("Engine", "postgres")
            .property("DBInstanceClass", instance_class)
            .property("AllocatedStorage", storage)
            .property("MultiAZ", multi_az)
            .property("MasterUsername", parameters.db_username.reference())
            .property("MasterUserPassword", parameters.db_password.reference())
            .property("DBSubnetGroupName", subnet_group.reference())
            .property("VPCSecurityGroups", Value::list([groups.database.reference()]))
            .property("PubliclyAccessible", false)
            .property("Tags", cluster_tags("database")),
    )
}

fn declare_bucket(template: &mut TemplateBuilder) -> Result<ResourceHandle, Error> {
    template.declare_resource(
        Resource::new("ioBucket", "AWS::S3::Bucket")
            .deletion_policy(DeletionPolicy::Retain)
            .property("AccessControl", "Private")
            .property("Tags", cluster_tags("bucket")),
    )
}

fn declare_dns_record(
    template: &mut TemplateBuilder,
    load_balancer: &ResourceHandle,
    parameters: &Parameters,
) -> Result<ResourceHandle, Error> {
    template.declare_resource(
        Resource::new("ioDNSRecord", "AWS::Route53::RecordSet")
            .property("HostedZoneName", parameters.hosted_zone.reference())
            .property(
                "Name",
                Value::join(
                    "",
                    [
                        Value::pseudo(Pseudo::StackName),
                        Value::from("."),
                        parameters.hosted_zone.reference(),
                    ],
                ),
            )
            .property("Type", "CNAME")
            .property("TTL", "300")
            .property(
                "ResourceRecords",
                Value::list([load_balancer.attribute("DNSName")]),
            ),
    )
}

fn export_name(suffix: &str) -> Value {
    Value::join("-", [Value::pseudo(Pseudo::StackName), Value::from(suffix)])
}

fn declare_outputs(
    template: &mut TemplateBuilder,
    settings: &ClusterSettings,
    load_balancer: &ResourceHandle,
    database: &ResourceHandle,
    bucket: &ResourceHandle,
    record: &ResourceHandle,
) -> Result<(), Error> {
    template.declare_output(
        Output::new("LoadBalancerDNS", load_balancer.attribute("DNSName"))
            .description("DNS name of the front load balancer"),
    )?;
    template.declare_output(
        Output::new(
            "ClusterURL",
            Value::join("", [Value::from("https://"), record.reference()]),
        )
        .description("Public URL of the cluster")
        .export(export_name("ClusterURL")),
    )?;
    template.declare_output(
        Output::new("BucketName", bucket.reference())
            .description("Name of the cluster bucket")
            .export(export_name("BucketName")),
    )?;
    template.declare_output(
        Output::new(
            "DatabaseEndpoint",
            Value::join(
                ":",
                [
                    database.attribute("Endpoint.Address"),
                    database.attribute("Endpoint.Port"),
                ],
            ),
        )
        .description("Address and port of the database"),
    )?;
    template.declare_output(
        Output::new("DiscoveryURL", settings.discovery_token.as_str())
            .description("etcd discovery URL baked into the instances' cloud-init"),
    )?;
    return Ok(());
}

/// Declares the whole stack. Mappings come first so lookups can be resolved
/// while resources are declared.
pub fn build(settings: &ClusterSettings) -> Result<TemplateBuilder, Error> {
    let description = settings
        .description
        .clone()
        .unwrap_or_else(|| String::from(DEFAULT_DESCRIPTION));
    let mut template = TemplateBuilder::new().with_description(description);

    let regions = template.declare_mapping(region_map())?;
    let profiles = template.declare_mapping(profile_map())?;
    let parameters = declare_parameters(&mut template)?;

    let network = declare_network(&mut template)?;
    let groups = declare_security_groups(&mut template, &network, &parameters)?;
    let load_balancer = declare_load_balancer(&mut template, &network, &groups, &parameters)?;
    declare_fleet(
        &mut template,
        settings,
        &regions,
        &profiles,
        &network,
        &groups,
        &load_balancer,
        &parameters,
    )?;
    let database = declare_database(&mut template, &profiles, &network, &groups, &parameters)?;
    let bucket = declare_bucket(&mut template)?;
    let record = declare_dns_record(&mut template, &load_balancer, &parameters)?;
    declare_outputs(
        &mut template,
        settings,
        &load_balancer,
        &database,
        &bucket,
        &record,
    )?;

    info!(region = ?settings.region, "assembled cluster template");
    return Ok(template);
}
