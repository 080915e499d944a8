//! Queue construction, without a DMA controller

use stm32_lpbam::{
    adc, builder, gpio, i2c, lptim, spi, Buffer, Descriptor, Error, NodeHandle, NodeKind,
    NodePool, NodeTag, Placement, TriggerConfig, TriggerSource,
};

const POOL: u32 = 0x2800_0040;

/// Buffers that are never handed to hardware
fn bytes(address: u32, len: usize) -> Buffer<u8> {
    // Safety: only used for node images.
    unsafe { Buffer::from_raw(address, len) }
}

fn samples(address: u32, len: usize) -> Buffer<u16> {
    // Safety: only used for node images.
    unsafe { Buffer::from_raw(address, len) }
}

fn handles(descriptors: &[Descriptor]) -> Vec<NodeHandle> {
    descriptors
        .iter()
        .flat_map(|descriptor| descriptor.nodes().map(|(_, handle)| handle))
        .collect()
}

#[test]
fn node_counts_add_up() {
    let mut pool = NodePool::<32>::with_address(POOL);
    let mut queue = pool.queue();
    let linear = Placement::LINEAR;

    let mut descriptors = Vec::new();
    descriptors.push(
        lptim::start(
            &mut pool,
            &mut queue,
            linear,
            &lptim::StartConfig {
                lptim: lptim::LPTIM1,
                mode: lptim::Mode::Continuous,
            },
        )
        .unwrap(),
    );
    descriptors.push(
        adc::conversion(
            &mut pool,
            &mut queue,
            linear,
            &adc::ConversionConfig {
                adc: adc::ADC4,
                channels: 0b101,
            },
        )
        .unwrap(),
    );
    descriptors.push(
        adc::data(
            &mut pool,
            &mut queue,
            linear,
            &adc::DataConfig {
                adc: adc::ADC4,
                buffer: samples(0x2800_4000, 16),
                settings: 0,
                continuous: true,
                continuous_requests: true,
            },
        )
        .unwrap(),
    );
    descriptors.push(
        spi::transmit(
            &mut pool,
            &mut queue,
            linear,
            &spi::TransferConfig {
                spi: spi::SPI3,
                buffer: bytes(0x2800_4100, 8),
            },
        )
        .unwrap(),
    );
    descriptors.push(
        i2c::master_transmit(
            &mut pool,
            &mut queue,
            linear,
            &i2c::MasterConfig::new(0x42, bytes(0x2800_4200, 4)),
        )
        .unwrap(),
    );
    descriptors.push(
        gpio::write(
            &mut pool,
            &mut queue,
            linear,
            &gpio::PinWrite {
                port: gpio::LPGPIO1,
                pin: 1,
                state: gpio::PinState::High,
            },
        )
        .unwrap(),
    );
    descriptors.push(adc::stop(&mut pool, &mut queue, linear, &adc::ADC4).unwrap());
    descriptors.push(lptim::stop(&mut pool, &mut queue, linear, &lptim::LPTIM1).unwrap());

    let lengths: Vec<usize> = descriptors.iter().map(Descriptor::len).collect();
    assert_eq!(lengths, [2, 2, 2, 4, 2, 1, 1, 1]);
    assert_eq!(queue.len(), 15);
    assert_eq!(pool.used(), 15);
    assert_eq!(queue.walk(&pool).count(), 15);
    queue.validate(&pool).unwrap();

    assert!(descriptors.iter().all(|descriptor| descriptor
        .nodes()
        .all(|(_, node)| pool.kind(node) == Some(descriptor.kind()))));
    let head = queue.head().unwrap();
    let tail = queue.tail().unwrap();
    assert_eq!(pool.kind(head), Some(NodeKind::LptimStart));
    assert_eq!(pool.kind(tail), Some(NodeKind::LptimStop));
}

#[test]
fn chunked_transfers() {
    for (total, chunks) in [(1, 1), (255, 1), (256, 2), (600, 3), (765, 3)] {
        let mut pool = NodePool::<8>::with_address(POOL);
        let mut queue = pool.queue();
        let data = bytes(0x2800_4000, total);
        let mut lengths = Vec::new();
        let count = builder::append_chunked(data.len(), i2c::MAX_TRANSFER, |chunk| {
            lengths.push(chunk.len);
            let config = i2c::MasterConfig::new(0x42, data)
                .for_chunk(&chunk)
                .ok_or(Error::InvalidConfiguration)?;
            i2c::master_transmit(&mut pool, &mut queue, Placement::LINEAR, &config)
        })
        .unwrap();
        assert_eq!(count, chunks, "{total} bytes");
        assert_eq!(queue.len(), 2 * chunks);
        assert_eq!(lengths.iter().sum::<usize>(), total);
        assert!(lengths.iter().all(|&len| len <= i2c::MAX_TRANSFER));
    }
}

#[test]
fn walk_follows_append_order() {
    let mut pool = NodePool::<8>::with_address(POOL);
    let mut queue = pool.queue();
    let pwm = lptim::PwmConfig {
        lptim: lptim::LPTIM1,
        channel: lptim::Channel::Two,
        period: 100,
        pulse: 10,
    };
    let descriptors = [
        lptim::pwm(&mut pool, &mut queue, Placement::LINEAR, &pwm).unwrap(),
        spi::receive(
            &mut pool,
            &mut queue,
            Placement::LINEAR,
            &spi::TransferConfig {
                spi: spi::SPI3,
                buffer: samples(0x2800_4000, 4),
            },
        )
        .unwrap(),
        lptim::stop(&mut pool, &mut queue, Placement::LINEAR, &lptim::LPTIM1).unwrap(),
    ];
    let walked: Vec<NodeHandle> = queue.walk(&pool).collect();
    assert_eq!(walked, handles(&descriptors));
    assert_eq!(queue.head(), walked.first().copied());
    assert_eq!(queue.tail(), walked.last().copied());
    assert_eq!(pool.node(walked[6]).next(), None);
}

#[test]
fn circular_queue_revisits_its_loop_start() {
    let mut pool = NodePool::<8>::with_address(POOL);
    let mut queue = pool.queue();
    let pin = |state| gpio::PinWrite {
        port: gpio::LPGPIO1,
        pin: 7,
        state,
    };
    let start = lptim::StartConfig {
        lptim: lptim::LPTIM1,
        mode: lptim::Mode::Single,
    };
    let first = lptim::start(&mut pool, &mut queue, Placement::LINEAR, &start).unwrap();
    let high = gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(gpio::PinState::High))
        .unwrap();
    gpio::write(&mut pool, &mut queue, Placement::LINEAR, &pin(gpio::PinState::Low)).unwrap();
    queue.set_circular(&mut pool, &high, NodeTag::Data).unwrap();

    let n = queue.len();
    assert_eq!(n, 4);
    let walked: Vec<NodeHandle> = queue.walk(&pool).take(3 * n).collect();
    let loop_start = high.node(NodeTag::Data).unwrap();
    assert_eq!(queue.loop_start(), Some(loop_start));
    assert_eq!(walked[n], loop_start);
    assert_eq!(walked[n + 1], walked[3]);
    assert!(!walked[n..].contains(&first.node(NodeTag::Enable).unwrap()));

    assert_eq!(
        lptim::stop(&mut pool, &mut queue, Placement::LINEAR, &lptim::LPTIM1),
        Err(Error::AlreadyCircular)
    );
    assert_eq!(
        queue.set_circular(&mut pool, &first, NodeTag::Start),
        Err(Error::AlreadyCircular)
    );
}

#[test]
fn failed_trigger_changes_nothing() {
    let mut pool = NodePool::<8>::with_address(POOL);
    let mut queue = pool.queue();
    let mut other = pool.queue();
    let pwm = lptim::PwmConfig {
        lptim: lptim::LPTIM1,
        channel: lptim::Channel::One,
        period: 40,
        pulse: 20,
    };
    let descriptor = lptim::pwm(&mut pool, &mut queue, Placement::LINEAR, &pwm).unwrap();
    let foreign = lptim::stop(&mut pool, &mut other, Placement::LINEAR, &lptim::LPTIM1).unwrap();
    let nodes: Vec<NodeHandle> = queue.walk(&pool).chain(other.walk(&pool)).collect();
    assert_eq!(nodes.len(), 3);
    let images = |pool: &NodePool<8>| -> Vec<_> {
        nodes.iter().map(|&node| pool.node(node).image()).collect()
    };
    let before = images(&pool);

    let trigger = TriggerConfig::rising(TriggerSource::RTC_WUT_TRG);
    assert_eq!(
        queue.set_trigger(&mut pool, &descriptor, NodeTag::Stop, &trigger),
        Err(Error::UnknownNode)
    );
    assert_eq!(
        queue.set_trigger(&mut pool, &foreign, NodeTag::Stop, &trigger),
        Err(Error::UnknownNode)
    );

    assert_eq!(before, images(&pool));
    assert!(!pool.node(descriptor.node(NodeTag::Data).unwrap()).is_triggered());
}

#[test]
fn adc_data_without_continuous_requests_needs_a_trigger() {
    let mut pool = NodePool::<4>::with_address(POOL);
    let mut queue = pool.queue();
    let config = adc::DataConfig {
        adc: adc::ADC4,
        buffer: samples(0x2800_4000, 8),
        settings: 0,
        continuous: false,
        continuous_requests: false,
    };
    let data = adc::data(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();
    let node = data.node(NodeTag::Data).unwrap();
    assert_eq!(queue.validate(&pool), Err(Error::MissingTrigger(node)));

    let trigger = TriggerConfig::rising(TriggerSource::LPTIM1_CH1);
    queue
        .set_trigger(&mut pool, &data, NodeTag::Data, &trigger)
        .unwrap();
    queue.validate(&pool).unwrap();
    assert_eq!(
        queue.set_trigger(&mut pool, &data, NodeTag::Data, &trigger),
        Err(Error::AlreadyTriggered)
    );
}

#[test]
fn pool_exhaustion_leaves_the_queue_intact() {
    let mut pool = NodePool::<5>::with_address(POOL);
    let mut queue = pool.queue();
    let config = spi::TransferConfig {
        spi: spi::SPI3,
        buffer: bytes(0x2800_4000, 2),
    };
    spi::transmit(&mut pool, &mut queue, Placement::LINEAR, &config).unwrap();
    assert_eq!(
        spi::transmit(&mut pool, &mut queue, Placement::LINEAR, &config),
        Err(Error::PoolExhausted)
    );
    assert_eq!(queue.len(), 4);
    assert_eq!(pool.used(), 4);
    assert_eq!(pool.node(queue.tail().unwrap()).next(), None);
    lptim::stop(&mut pool, &mut queue, Placement::LINEAR, &lptim::LPTIM1).unwrap();
    assert_eq!(queue.len(), 5);
}
