//! 状态机功能测试程序
//!
//! 在板上验证上报链路状态机和温度报警状态机的状态转换

#![no_std]
#![no_main]

extern crate alloc;

use alert_station::alert::{AlertMonitor, AlertTransition};
use alert_station::report::TelemetryReport;
use alert_station::state_machine::{
    Action, ConnectionMode, LinkEvent, LinkState, LinkStateMachine, ReconnectPolicy,
};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_println::println;

esp_bootloader_esp_idf::esp_app_desc!();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("❌ 测试失败: {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let _peripherals = esp_hal::init(config);

    // Initialize heap allocator
    esp_alloc::heap_allocator!(size: 32 * 1024);

    println!("=== 状态机功能测试 ===");

    // 1. 报警状态机（滞回）
    println!("\n1. 测试报警滞回");
    let mut alert = AlertMonitor::default();
    assert_eq!(alert.evaluate(29.9), None);
    assert_eq!(alert.evaluate(30.0), Some(AlertTransition::Raised));
    assert_eq!(alert.evaluate(28.5), None);
    assert!(alert.is_active());
    println!("✅ 阈值与滞回区间内保持报警: count={}", alert.count());
    assert_eq!(alert.evaluate(27.9), Some(AlertTransition::Cleared));
    assert_eq!(alert.raise_threshold(), 31.0);
    assert!(!alert.is_active());
    println!("✅ 报警解除并调整阈值: {:.1} C", alert.threshold());

    // 2. 链路初始状态
    println!("\n2. 测试初始状态");
    let mut link = LinkStateMachine::new(ConnectionMode::Persistent, ReconnectPolicy::new(5000, 3));
    assert_eq!(link.get_current_state(), LinkState::Offline);
    assert!(link.update(0).is_empty());
    println!("✅ 初始状态正确: {:?}", link.get_current_state());

    // 3. 网络就绪后立即发起第一次连接
    println!("\n3. 测试连接流程");
    link.handle_event(LinkEvent::NetworkUp);
    assert_eq!(link.get_current_state(), LinkState::Disconnected);
    assert_eq!(link.update(0), [Action::OpenConnection { attempt: 1 }]);
    link.handle_event(LinkEvent::ConnectSucceeded);
    assert_eq!(link.get_current_state(), LinkState::Connected);
    println!("✅ 连接成功: {:?}", link.get_current_state());

    // 4. 报告发送
    println!("\n4. 测试报告发送");
    let report = TelemetryReport::new(31.0, &alert.snapshot());
    link.queue_report(report);
    assert_eq!(link.update(100), [Action::SendReport(report)]);
    assert_eq!(link.get_current_state(), LinkState::Sending);
    link.handle_event(LinkEvent::SendSucceeded);
    assert_eq!(link.get_current_state(), LinkState::Connected);
    assert_eq!(link.get_stats().sent, 1);
    println!("✅ 报告已发送: {:?}", link.get_stats());

    // 5. 服务器关闭连接属于正常结束
    println!("\n5. 测试服务器关闭连接");
    link.handle_event(LinkEvent::PeerClosed);
    assert_eq!(link.get_current_state(), LinkState::Disconnected);
    assert_eq!(link.get_stats().failed, 0);
    println!("✅ 服务器关闭连接处理正确: {:?}", link.get_current_state());

    // 6. 重连次数用尽
    println!("\n6. 测试重连策略");
    let mut now = 200;
    for attempt in 1..=3 {
        assert_eq!(link.update(now), [Action::OpenConnection { attempt }]);
        link.handle_event(LinkEvent::ConnectFailed);
        if attempt < 3 {
            assert!(link.update(now + 4999).is_empty());
        }
        now += 5000;
    }
    assert!(link.update(now).is_empty());
    assert_eq!(link.get_current_state(), LinkState::Exhausted);
    assert_eq!(link.update(now), [Action::LogError(LinkState::Exhausted)]);
    println!("✅ 重连 {} 次后放弃", link.get_retry_count());

    // 7. 只有网络重新关联才能恢复
    println!("\n7. 测试网络恢复");
    link.handle_event(LinkEvent::NetworkUp);
    assert_eq!(link.get_current_state(), LinkState::Exhausted);
    link.handle_event(LinkEvent::NetworkDown);
    link.handle_event(LinkEvent::NetworkUp);
    assert_eq!(link.get_current_state(), LinkState::Disconnected);
    assert_eq!(link.get_retry_count(), 0);
    println!("✅ 网络恢复后重置重连计数");

    // 8. 状态指示灯
    println!("\n8. 测试状态指示灯映射");
    let test_states = [
        LinkState::Offline,
        LinkState::Disconnected,
        LinkState::Connecting,
        LinkState::Connected,
        LinkState::Sending,
        LinkState::Exhausted,
    ];
    for state in test_states.iter() {
        link.force_transition(*state);
        println!("链路状态 {:?} -> 指示灯 {:?}", state, link.get_status_pattern());
    }

    println!("\n=== 所有测试通过! ===");

    let delay = Delay::new();
    loop {
        delay.delay_millis(1000);
    }
}
